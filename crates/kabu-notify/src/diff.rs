//! 銘柄コードスナップショットの保管と差分計算。
//!
//! 同期のたびに当日の銘柄コード一覧を日付付きファイルに保存し、
//! 後から任意の 2 日分を突き合わせて新規・消滅銘柄を求めます。
//! 差分はコードの集合差で、属性の変化 (社名変更など) は対象外です。

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use kabu_core::CompanyRecord;

use crate::types::{NotifyError, NotifyResult};

/// 日付ごとの銘柄コードスナップショット置き場。
///
/// ファイル配置は `{dir}/company_codes_{YYYY-MM-DD}.csv`、中身は
/// `Code` 列 1 本の CSV です。
pub struct SnapshotArchive {
    dir: PathBuf,
}

impl SnapshotArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("company_codes_{}.csv", date.format("%Y-%m-%d")))
    }

    /// 指定日のスナップショットを保存 (上書き)。
    pub fn save(&self, date: NaiveDate, codes: &[String]) -> NotifyResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| snapshot_error(&self.dir, e))?;

        let path = self.path_for(date);
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| NotifyError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        writer
            .write_record(["Code"])
            .and_then(|_| {
                for code in codes {
                    writer.write_record([code.as_str()])?;
                }
                writer.flush().map_err(csv::Error::from)
            })
            .map_err(|e| NotifyError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(date = %date, codes = codes.len(), "スナップショットを保存");
        Ok(())
    }

    /// 指定日のスナップショットを読み込み。ファイルが無ければ `None`。
    pub fn load(&self, date: NaiveDate) -> NotifyResult<Option<BTreeSet<String>>> {
        let path = self.path_for(date);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| NotifyError::Snapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut codes = BTreeSet::new();
        for record in reader.records() {
            let record = record.map_err(|e| NotifyError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            if let Some(code) = record.get(0) {
                let code = code.trim();
                if !code.is_empty() {
                    codes.insert(code.to_string());
                }
            }
        }
        Ok(Some(codes))
    }

    /// スナップショットが存在する日付を昇順で列挙。
    pub fn available_dates(&self) -> NotifyResult<Vec<NaiveDate>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| snapshot_error(&self.dir, e))?;
        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| snapshot_error(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(date_part) = name
                .strip_prefix("company_codes_")
                .and_then(|rest| rest.strip_suffix(".csv"))
            {
                if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// 直近 2 日分の日付 (比較対象)。2 日分揃わなければ `None`。
    pub fn latest_pair(&self) -> NotifyResult<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.available_dates()?;
        match dates.as_slice() {
            [.., previous, current] => Ok(Some((*previous, *current))),
            _ => Ok(None),
        }
    }
}

fn snapshot_error(path: &Path, e: std::io::Error) -> NotifyError {
    NotifyError::Snapshot {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// 2 時点の銘柄コード集合の差分。
#[derive(Debug, Clone)]
pub struct CompanyDiff {
    pub previous_date: NaiveDate,
    pub current_date: NaiveDate,
    /// 新たに現れたコード (昇順)
    pub added: Vec<String>,
    /// 消えたコード (昇順)
    pub removed: Vec<String>,
}

impl CompanyDiff {
    /// 前日と当日の集合から差分を計算。
    pub fn between(
        previous_date: NaiveDate,
        previous: &BTreeSet<String>,
        current_date: NaiveDate,
        current: &BTreeSet<String>,
    ) -> Self {
        Self {
            previous_date,
            current_date,
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
        }
    }

    /// 変動があったか。
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// 通知メッセージに整形。
    ///
    /// 社名・業種は格納済みの銘柄一覧から引きます。銘柄は削除されない
    /// (上場廃止は状態フラグ) ため、消滅コードの社名も一覧から引けます。
    pub fn format_message(&self, companies: &[CompanyRecord]) -> String {
        let names: HashMap<&str, &CompanyRecord> = companies
            .iter()
            .map(|company| (company.code.as_str(), company))
            .collect();

        let mut lines = vec![
            "📊 日本株データ同期 - 銘柄変動通知".to_string(),
            String::new(),
            format!("📅 {} → {}", self.previous_date, self.current_date),
            String::new(),
        ];

        if !self.added.is_empty() {
            lines.push(format!("🆕 新規追加 ({}銘柄):", self.added.len()));
            for code in &self.added {
                lines.push(describe(code, names.get(code.as_str()).copied()));
            }
            lines.push(String::new());
        }

        if !self.removed.is_empty() {
            lines.push(format!("❌ 削除 ({}銘柄):", self.removed.len()));
            for code in &self.removed {
                lines.push(describe(code, names.get(code.as_str()).copied()));
            }
            lines.push(String::new());
        }

        if !self.has_changes() {
            lines.push("✅ 銘柄の変動はありませんでした".to_string());
        }

        lines.join("\n").trim_end().to_string()
    }
}

fn describe(code: &str, company: Option<&CompanyRecord>) -> String {
    match company {
        Some(company) => format!(
            "• {} {} [{}]",
            code, company.company_name, company.sector_name
        ),
        None => format!("• {}", code),
    }
}
