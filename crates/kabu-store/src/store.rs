//! Dataset Store 本体。
//!
//! ファイル配置:
//! - `{root}/listed_companies.csv` — 上場銘柄
//! - `{root}/stock_price/stock_data.csv` — 日次株価
//! - `{root}/finance/finance_data.csv` — 財務諸表
//!
//! 読み込みは文字コードフォールバック付き、書き込みは一時ファイル経由の
//! 原子的置換です。互換コピーを有効にすると各ファイルの CP932 版
//! (`*_sjis.csv`) も併せて出力します。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use kabu_core::{CompanyRecord, FinancialRecord, ListingStatus, PriceRecord, RecordKind};

use crate::codec;
use crate::error::{Result, StoreError};
use crate::merge::{merge_records, MergePolicy, MergeResult, StoredRecord};

/// CSV データセットストア。
///
/// ディスク上の表現を排他的に所有します。呼び出し側はマージ結果と
/// スナップショットだけを受け取り、ファイルを直接触りません。
pub struct DatasetStore {
    root: PathBuf,
    write_sjis_copy: bool,
}

impl DatasetStore {
    /// 出力ディレクトリを指定してストアを生成。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_sjis_copy: false,
        }
    }

    /// CP932 互換コピーの出力を設定。
    pub fn with_sjis_copy(mut self, enabled: bool) -> Self {
        self.write_sjis_copy = enabled;
        self
    }

    /// ストアのルートディレクトリ。
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 種別ごとのファイルパス。
    pub fn kind_path(&self, kind: RecordKind) -> PathBuf {
        match kind {
            RecordKind::Company => self.root.join("listed_companies.csv"),
            RecordKind::Price => self.root.join("stock_price").join("stock_data.csv"),
            RecordKind::Financial => self.root.join("finance").join("finance_data.csv"),
        }
    }

    // ====== 読み込み ======

    /// 上場銘柄をキー順で読み込み。ファイルが無ければ空。
    pub fn load_companies(&self) -> Result<Vec<CompanyRecord>> {
        self.load_records(&self.kind_path(RecordKind::Company))
    }

    /// 日次株価をキー順で読み込み。ファイルが無ければ空。
    pub fn load_prices(&self) -> Result<Vec<PriceRecord>> {
        self.load_records(&self.kind_path(RecordKind::Price))
    }

    /// 財務諸表をキー順で読み込み。ファイルが無ければ空。
    pub fn load_statements(&self) -> Result<Vec<FinancialRecord>> {
        self.load_records(&self.kind_path(RecordKind::Financial))
    }

    // ====== マージ ======

    /// 上場銘柄のマージ (上書き方針)。
    pub fn merge_companies(&self, incoming: Vec<CompanyRecord>) -> Result<MergeResult> {
        self.merge_into(RecordKind::Company, incoming, MergePolicy::Overwrite)
    }

    /// 日次株価のマージ (不変方針)。
    pub fn merge_prices(&self, incoming: Vec<PriceRecord>) -> Result<MergeResult> {
        self.merge_into(RecordKind::Price, incoming, MergePolicy::Immutable)
    }

    /// 財務諸表のマージ (上書き方針、訂正開示を反映)。
    pub fn merge_statements(&self, incoming: Vec<FinancialRecord>) -> Result<MergeResult> {
        self.merge_into(RecordKind::Financial, incoming, MergePolicy::Overwrite)
    }

    /// 最新の上場一覧に現れなかった銘柄を上場廃止として記録。
    ///
    /// 行は削除せず状態フラグだけを倒します。変更した行数を返します。
    pub fn mark_delisted(&self, observed_codes: &HashSet<String>) -> Result<usize> {
        let path = self.kind_path(RecordKind::Company);
        let mut companies: Vec<CompanyRecord> = self.load_records(&path)?;

        let mut changed = 0usize;
        for company in companies.iter_mut() {
            if company.status == ListingStatus::Listed && !observed_codes.contains(&company.code) {
                company.status = ListingStatus::Delisted;
                changed += 1;
                info!(
                    code = %company.code,
                    name = %company.company_name,
                    "上場一覧から消えたため上場廃止として記録"
                );
            }
        }

        if changed > 0 {
            self.write_records(&path, &companies)?;
        }
        Ok(changed)
    }

    // ====== スナップショット ======

    /// 同一性キーの一覧 (昇順) を返します。
    ///
    /// 識別列だけを読むため、レコード本体は構築しません。複合キーは
    /// `|` 区切りで連結します。
    pub fn snapshot(&self, kind: RecordKind) -> Result<Vec<String>> {
        let path = self.kind_path(kind);
        let Some(text) = self.read_decoded(&path)? else {
            return Ok(Vec::new());
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| StoreError::csv(&path, e))?
            .clone();
        let header_map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();

        let mut indices = Vec::new();
        for column in identity_columns(kind) {
            let idx = header_map.get(*column).copied().ok_or_else(|| {
                StoreError::integrity(&path, format!("識別列 {column} がありません"))
            })?;
            indices.push(idx);
        }

        let mut keys = Vec::new();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "解析できない行をスキップ");
                    continue;
                }
            };
            let parts: Vec<&str> = indices
                .iter()
                .map(|idx| record.get(*idx).unwrap_or(""))
                .collect();
            keys.push(parts.join("|"));
        }
        keys.sort();
        Ok(keys)
    }

    /// 株価ファイル内の最新取引日。
    pub fn latest_price_date(&self) -> Result<Option<NaiveDate>> {
        self.latest_date_in_column(&self.kind_path(RecordKind::Price), "Date")
    }

    /// 財務ファイル内の最新開示日。
    pub fn latest_disclosure_date(&self) -> Result<Option<NaiveDate>> {
        self.latest_date_in_column(&self.kind_path(RecordKind::Financial), "DisclosedDate")
    }

    // ====== 内部実装 ======

    fn merge_into<R>(
        &self,
        kind: RecordKind,
        incoming: Vec<R>,
        policy: MergePolicy,
    ) -> Result<MergeResult>
    where
        R: StoredRecord + Serialize + DeserializeOwned,
    {
        let path = self.kind_path(kind);
        let existing: Vec<R> = self.load_records(&path)?;
        let (merged, result) = merge_records(kind, existing, incoming, policy);
        self.write_records(&path, &merged)?;

        debug!(
            kind = %kind,
            added = result.added,
            updated = result.updated,
            unchanged = result.unchanged,
            conflicts = result.conflicts,
            "マージ完了"
        );
        Ok(result)
    }

    /// ファイルを読み、フォールバック付きで復号します。無ければ `None`。
    fn read_decoded(&self, path: &Path) -> Result<Option<String>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        match codec::decode_with_fallback(&bytes) {
            Some((text, encoding)) => {
                if encoding != "utf-8" {
                    debug!(path = %path.display(), encoding, "フォールバック符号化で読み込み");
                }
                Ok(Some(text))
            }
            None => Err(StoreError::Decode {
                path: path.display().to_string(),
                tried: codec::READ_ENCODINGS.to_vec(),
            }),
        }
    }

    fn load_records<R: DeserializeOwned>(&self, path: &Path) -> Result<Vec<R>> {
        let Some(text) = self.read_decoded(path)? else {
            return Ok(Vec::new());
        };

        // 途中で切れた行 (書き込み中断の残骸など) は読める範囲を生かす。
        // 欠けた日付は次回の増分同期が埋める
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %path.display(), error = %e, "解析できない行をスキップ");
                }
            }
        }
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "不完全な行を読み飛ばしました");
        }
        Ok(records)
    }

    fn write_records<R: Serialize>(&self, path: &Path, records: &[R]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| StoreError::csv(path, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::integrity(path, format!("CSV バッファの確定に失敗: {e}")))?;

        self.write_atomic(path, &bytes)?;

        if self.write_sjis_copy {
            self.write_sjis_sibling(path, &bytes)?;
        }
        Ok(())
    }

    /// 一時ファイルに書いてから置換します。置換前に失敗しても既存
    /// ファイルは変化しません。
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::io(path, e)
        })
    }

    fn write_sjis_sibling(&self, path: &Path, utf8_bytes: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(utf8_bytes)
            .map_err(|e| StoreError::integrity(path, format!("UTF-8 として解釈できません: {e}")))?;
        let (encoded, had_replacements) = codec::encode_sjis(text);
        if had_replacements {
            warn!(
                path = %path.display(),
                "CP932 に変換できない文字を置換して互換コピーを出力"
            );
        }
        self.write_atomic(&sjis_path(path), &encoded)
    }

    fn latest_date_in_column(&self, path: &Path, column: &str) -> Result<Option<NaiveDate>> {
        let Some(text) = self.read_decoded(path)? else {
            return Ok(None);
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| StoreError::csv(path, e))?
            .clone();
        let idx = headers
            .iter()
            .position(|name| name.trim() == column)
            .ok_or_else(|| StoreError::integrity(path, format!("列 {column} がありません")))?;

        let mut latest: Option<NaiveDate> = None;
        for record in reader.records() {
            // 途中で切れた行の日付を「格納済み」と数えると、その日が
            // 二度と取得されなくなるため、行ごと読み飛ばす
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "解析できない行をスキップ");
                    continue;
                }
            };
            let value = record.get(idx).unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                StoreError::integrity(path, format!("{column} 列の日付を解析できません: {value}"))
            })?;
            latest = Some(latest.map_or(date, |current| current.max(date)));
        }
        Ok(latest)
    }
}

/// 種別ごとの識別列 (同一性キーを構成する列、並び順はキー順)。
fn identity_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Company => &["Code"],
        RecordKind::Price => &["Date", "Code"],
        RecordKind::Financial => &["Code", "CurrentPeriodEndDate", "TypeOfCurrentPeriod"],
    }
}

/// 互換コピーのパス (`stock_data.csv` → `stock_data_sjis.csv`)。
fn sjis_path(path: &Path) -> PathBuf {
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => path.with_file_name(format!("{stem}_sjis.csv")),
        None => path.with_extension("sjis.csv"),
    }
}
