//! 日本株データ収集エンジン。
//!
//! J-Quants API から上場銘柄・日次株価・財務諸表を取得し、CSV の
//! Dataset Store へ冪等にマージします。実行単位ごとの結果は
//! [`RunReport`] に集計され、部分失敗があってもプロセスは最後まで
//! 走り切ります。

pub mod config;
pub mod error;
pub mod modules;
pub mod report;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use report::{RunOutcome, RunReport, SyncFailure};
