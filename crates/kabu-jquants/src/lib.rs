//! kabu-jquants — J-Quants API クライアント。
//!
//! トークン認証 (リフレッシュトークン → ID トークン)、プロセス全体で
//! 共有する呼び出し間隔スロットル、指数バックオフ再試行、ページ送りの
//! 自動追跡を備えた [`kabu_core::MarketDataProvider`] 実装を提供します。

pub mod auth;
pub mod client;
pub mod retry;
pub mod throttle;
pub mod types;

pub use auth::{JQuantsCredentials, TokenProvider};
pub use client::{today_tokyo, JQuantsClient, JQuantsConfig, DEFAULT_BASE_URL};
pub use retry::{with_retry, RetryDecision, RetryPolicy};
pub use throttle::Throttle;
