//! kabu-store — CSV データセットストア。
//!
//! 銘柄・株価・財務の 3 種の CSV ファイルを所有し、読み込み (文字コード
//! フォールバック付き)・同一性キーによるマージ・同一性スナップショットを
//! 提供します。書き込みは一時ファイル経由の原子的置換で、途中で強制終了
//! されても既存ファイルは壊れません。

pub mod codec;
pub mod error;
pub mod merge;
pub mod store;

pub use error::{Result, StoreError};
pub use merge::{MergePolicy, MergeResult};
pub use store::DatasetStore;
