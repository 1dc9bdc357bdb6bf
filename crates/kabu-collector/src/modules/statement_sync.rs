//! 財務諸表の同期。
//!
//! 開示日ベースで窓を計算し、1 日ずつ取得して最後にまとめてマージ
//! します。失敗の扱いは株価同期と同じで、一時的失敗は記録して継続、
//! 恒久的失敗は残りの日を打ち切ります。

use std::time::Instant;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kabu_core::{FinancialRecord, MarketCalendar, MarketDataProvider, RecordKind};
use kabu_store::DatasetStore;

use crate::error::Result;
use crate::modules::window::{compute_window, SyncOptions};
use crate::report::RunReport;

const RESOURCE: &str = "/fins/statements";

/// 財務諸表を同期します。
///
/// 窓の基点は開示日の最新値です。決算発表は営業日にしか行われないため
/// 株価と同じ営業日カレンダーで列挙します。
///
/// # Errors
/// ストアの最新開示日が読めない場合のみ `Err`。取得・マージの単位失敗
/// はレポートに記録されます。
pub async fn sync_statements(
    provider: &dyn MarketDataProvider,
    store: &DatasetStore,
    calendar: &MarketCalendar,
    options: &SyncOptions,
    today: NaiveDate,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new("財務諸表同期");

    let latest = store.latest_disclosure_date()?;
    let window = compute_window(options, latest, today, calendar);
    if window.is_empty() {
        info!("財務諸表は最新です、取得対象なし");
        report.elapsed = start.elapsed();
        return Ok(report);
    }
    info!(
        from = %window.first().unwrap_or(today),
        to = %window.last().unwrap_or(today),
        days = window.len(),
        "財務諸表の取得窓を計算"
    );

    let days = window.days();
    let mut batch: Vec<FinancialRecord> = Vec::new();

    for (idx, day) in days.iter().enumerate() {
        if cancel.is_cancelled() {
            report.skipped_days += days.len() - idx;
            warn!(skipped = report.skipped_days, "キャンセル要求を受信、残りの日を中止");
            break;
        }

        match provider.fetch_statements(*day).await {
            Ok(records) => {
                report.fetched += records.len();
                batch.extend(records);
            }
            Err(e) if e.is_fatal() => {
                report.record_failure(Some(*day), RESOURCE, e.to_string());
                report.skipped_days += days.len() - idx - 1;
                error!(date = %day, error = %e, "恒久的エラー、この種別の残りを中止");
                break;
            }
            Err(e) => {
                report.record_failure(Some(*day), RESOURCE, e.to_string());
                warn!(date = %day, error = %e, "一時的エラー、次の日へ継続");
            }
        }
    }

    if !batch.is_empty() {
        match store.merge_statements(batch) {
            Ok(result) => report.absorb_merge(&result),
            Err(e) => {
                report.record_failure(None, RecordKind::Financial.as_str(), e.to_string());
                error!(error = %e, "財務諸表のマージに失敗");
            }
        }
    }

    report.elapsed = start.elapsed();
    Ok(report)
}
