//! エラー型定義。

use std::fmt;

use kabu_core::FetchError;
use kabu_notify::NotifyError;
use kabu_store::StoreError;

/// Collector のエラー型。
///
/// 取得・格納の単位失敗は RunReport に吸収されるため、ここに届くのは
/// 設定不備などの起動時エラーと、実行を継続できない障害だけです。
#[derive(Debug)]
pub enum CollectorError {
    /// 設定エラー (環境変数不足・出力先不正)
    Config(String),
    /// 市場データ取得エラー
    Fetch(FetchError),
    /// データセットストアのエラー
    Store(StoreError),
    /// 通知エラー
    Notify(NotifyError),
    /// 一般エラー
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "設定エラー: {}", msg),
            Self::Fetch(e) => write!(f, "取得エラー: {}", e),
            Self::Store(e) => write!(f, "ストアエラー: {}", e),
            Self::Notify(e) => write!(f, "通知エラー: {}", e),
            Self::Other(e) => write!(f, "エラー: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<FetchError> for CollectorError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl From<StoreError> for CollectorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<NotifyError> for CollectorError {
    fn from(err: NotifyError) -> Self {
        Self::Notify(err)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 型エイリアス。
pub type Result<T> = std::result::Result<T, CollectorError>;
