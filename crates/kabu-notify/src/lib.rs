//! kabu-notify — 銘柄リスト差分の検出と通知。
//!
//! Dataset Store の銘柄コードスナップショットを日付ごとに保管し、
//! 前営業日との集合差分 (新規上場 / 消滅) を日本語メッセージに整形して
//! 通知チャネルへ送ります。通知チャネルは [`NotificationSink`] trait の
//! 実装として差し替え可能で、標準では LINE Messaging API を提供します。

pub mod diff;
pub mod line;
pub mod types;

pub use diff::{CompanyDiff, SnapshotArchive};
pub use line::{LineConfig, LineSender};
pub use types::{NotificationSink, NotifyError, NotifyResult};
