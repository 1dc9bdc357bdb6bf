//! 日次株価の同期。
//!
//! 取得窓の営業日を 1 日ずつ取得し、成功分をまとめてストアへマージ
//! します。1 日の一時的失敗は記録して次の日へ進み、認証拒否などの
//! 恒久的失敗は残りの日を打ち切ります。キャンセル要求は日の区切りで
//! 確認するため、実行中のマージが中断されることはありません。

use std::time::Instant;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kabu_core::{MarketCalendar, MarketDataProvider, PriceRecord, RecordKind};
use kabu_store::DatasetStore;

use crate::error::Result;
use crate::modules::window::{compute_window, SyncOptions};
use crate::report::RunReport;

const RESOURCE: &str = "/prices/daily_quotes";

/// 日次株価を同期します。
///
/// 窓はストアの最新取引日から導出するため、前回の部分失敗で欠けた
/// 日付は次回の増分実行で自然に再試行されます。
///
/// # Errors
/// ストアの最新日付が読めない場合のみ `Err`。取得・マージの単位失敗は
/// レポートに記録されます。
pub async fn sync_prices(
    provider: &dyn MarketDataProvider,
    store: &DatasetStore,
    calendar: &MarketCalendar,
    options: &SyncOptions,
    today: NaiveDate,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new("株価同期");

    let latest = store.latest_price_date()?;
    let window = compute_window(options, latest, today, calendar);
    if window.is_empty() {
        info!("株価は最新です、取得対象なし");
        report.elapsed = start.elapsed();
        return Ok(report);
    }
    info!(
        from = %window.first().unwrap_or(today),
        to = %window.last().unwrap_or(today),
        days = window.len(),
        "株価の取得窓を計算"
    );

    let days = window.days();
    let mut batch: Vec<PriceRecord> = Vec::new();

    for (idx, day) in days.iter().enumerate() {
        if cancel.is_cancelled() {
            report.skipped_days += days.len() - idx;
            warn!(skipped = report.skipped_days, "キャンセル要求を受信、残りの日を中止");
            break;
        }

        match provider.fetch_daily_quotes(*day).await {
            Ok(records) => {
                report.fetched += records.len();
                batch.extend(records);
            }
            Err(e) if e.is_fatal() => {
                // 拒否系は同じ資格情報で続けても無意味なので打ち切る
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
        match store.merge_prices(batch) {
            Ok(result) => report.absorb_merge(&result),
            Err(e) => {
                report.record_failure(None, RecordKind::Price.as_str(), e.to_string());
                error!(error = %e, "株価のマージに失敗");
            }
        }
    }

    report.elapsed = start.elapsed();
    Ok(report)
}
