//! 同期エンジンのモジュール群。

pub mod listed_sync;
pub mod price_sync;
pub mod statement_sync;
pub mod window;

pub use listed_sync::sync_listed;
pub use price_sync::sync_prices;
pub use statement_sync::sync_statements;
pub use window::{compute_window, FetchWindow, SyncMode, SyncOptions};
