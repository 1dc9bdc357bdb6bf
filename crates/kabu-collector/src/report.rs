//! 実行レポート構造体。

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use kabu_store::MergeResult;

/// 実行全体の終了状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// 全取得・全マージ成功
    Done,
    /// 一部の単位が失敗 (失敗一覧は RunReport に列挙)
    PartiallyFailed,
}

/// 失敗した取得・マージ単位。
///
/// 日付単位の失敗は `date` を持つため、再実行を失敗した日だけに
/// 絞り込めます。
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    /// 失敗した対象日 (日付単位でない失敗は None)
    pub date: Option<NaiveDate>,
    /// 失敗した処理の対象 (リソース名・レコード種別)
    pub resource: String,
    /// 失敗理由
    pub reason: String,
}

/// 同期 1 回分のレポート。
///
/// 構築後は読み取り専用で、ログ出力と差分通知のトリガー判定が
/// 消費します。
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 処理名 (ログ用)
    pub operation: String,
    /// 取得したレコード数
    pub fetched: usize,
    /// 追加・更新されたレコード数
    pub merged: usize,
    /// 内容に変化がなかったレコード数
    pub unchanged: usize,
    /// 不変種別で既存優先になった重複数
    pub conflicts: usize,
    /// 取得を開始しなかった日数 (中止・キャンセル)
    pub skipped_days: usize,
    /// 失敗一覧
    pub failures: Vec<SyncFailure>,
    /// 銘柄コードスナップショット (上場銘柄同期のみ)
    pub snapshot: Option<Vec<String>>,
    /// 所要時間
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            fetched: 0,
            merged: 0,
            unchanged: 0,
            conflicts: 0,
            skipped_days: 0,
            failures: Vec::new(),
            snapshot: None,
            elapsed: Duration::ZERO,
        }
    }

    /// 終了状態。失敗が 1 件でもあれば PartiallyFailed。
    pub fn outcome(&self) -> RunOutcome {
        if self.failures.is_empty() {
            RunOutcome::Done
        } else {
            RunOutcome::PartiallyFailed
        }
    }

    /// 失敗を記録。
    pub fn record_failure(
        &mut self,
        date: Option<NaiveDate>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.failures.push(SyncFailure {
            date,
            resource: resource.into(),
            reason: reason.into(),
        });
    }

    /// マージ結果を集計に反映。
    pub fn absorb_merge(&mut self, result: &MergeResult) {
        self.merged += result.merged_total();
        self.unchanged += result.unchanged;
        self.conflicts += result.conflicts;
    }

    /// 失敗した対象日の一覧 (昇順)。
    pub fn failed_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.failures.iter().filter_map(|f| f.date).collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// レポート要約をログ出力。
    pub fn log_summary(&self) {
        tracing::info!(
            operation = %self.operation,
            outcome = ?self.outcome(),
            fetched = self.fetched,
            merged = self.merged,
            unchanged = self.unchanged,
            conflicts = self.conflicts,
            skipped_days = self.skipped_days,
            failures = self.failures.len(),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "同期完了"
        );
        for failure in &self.failures {
            tracing::warn!(
                operation = %self.operation,
                date = failure.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                resource = %failure.resource,
                reason = %failure.reason,
                "失敗した単位"
            );
        }
    }
}
