//! 市場データ取得の抽象化。
//!
//! リモート市場データ API からの取得を提供者中立な trait として定義し、
//! 取得エラーを再試行可能性で分類します。同期エンジンはこの trait
//! だけに依存するため、テストではモック提供者に差し替えられます。

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

use super::records::{CompanyRecord, FinancialRecord, PriceRecord};

// =============================================================================
// エラー型
// =============================================================================

/// 市場データ取得エラー。
///
/// 一時的エラーのみ再試行の対象です。拒否系 (認証・不正リクエスト) は
/// 再試行しても回復しないため即座に打ち切ります。
#[derive(Debug, Error)]
pub enum FetchError {
    /// 一時的な障害 (接続失敗・タイムアウト・5xx)
    #[error("一時的な取得エラー ({resource}): {reason}")]
    Transient { resource: String, reason: String },

    /// レート制限超過 (HTTP 429)
    #[error("レート制限超過 ({resource})")]
    RateLimited {
        resource: String,
        /// サーバーが Retry-After で指示した待機秒数
        retry_after: Option<u64>,
    },

    /// 認証拒否 (401/403)
    #[error("認証に失敗しました: {0}")]
    AuthRejected(String),

    /// 不正なリクエスト・応答 (4xx、解析不能な本文、ページ上限超過)
    #[error("リクエストが拒否されました ({resource}): {reason}")]
    Rejected { resource: String, reason: String },
}

impl FetchError {
    /// 再試行で回復しうるエラーか。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// 再試行しても無意味なエラーか。
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// サーバーが指示した再試行までの待機時間。
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// エラーが対象としたリソース名 (ログ用)。
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Transient { resource, .. }
            | Self::RateLimited { resource, .. }
            | Self::Rejected { resource, .. } => Some(resource),
            Self::AuthRejected(_) => None,
        }
    }
}

// =============================================================================
// MarketDataProvider Trait
// =============================================================================

/// 市場データ提供者 trait。
///
/// 同期エンジンが必要とする 3 種のデータ取得を抽象化します。実装は
/// レート制限・再試行・ページネーションを内部で完結させ、呼び出し側
/// には分類済みの `FetchError` だけを返します。
///
/// # 実装例
///
/// ```ignore
/// pub struct JQuantsClient { /* ... */ }
///
/// #[async_trait]
/// impl MarketDataProvider for JQuantsClient {
///     async fn fetch_daily_quotes(&self, date: NaiveDate) -> Result<Vec<PriceRecord>, FetchError> {
///         // /prices/daily_quotes?date=... を全ページ取得して変換
///     }
///
///     // ... 残りのメソッド実装
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 上場銘柄一覧を取得。
    ///
    /// 全ページを取得し、観測日付きの銘柄レコードに変換して返します。
    ///
    /// # Errors
    ///
    /// - `FetchError::Transient` / `RateLimited`: 再試行枯渇後の一時的障害
    /// - `FetchError::AuthRejected`: 認証拒否
    /// - `FetchError::Rejected`: 不正な応答・ページ上限超過
    async fn fetch_listed_companies(&self) -> Result<Vec<CompanyRecord>, FetchError>;

    /// 指定取引日の全銘柄株価を取得。
    ///
    /// # Arguments
    ///
    /// * `date` - 取引日 (営業日であることは呼び出し側が保証)
    ///
    /// # Returns
    ///
    /// 当日の株価レコード一覧。休場日などデータが無い日は空。
    ///
    /// # Errors
    ///
    /// - `FetchError::Transient` / `RateLimited`: 再試行枯渇後の一時的障害
    /// - `FetchError::AuthRejected`: 認証拒否
    /// - `FetchError::Rejected`: 不正な応答・ページ上限超過
    async fn fetch_daily_quotes(&self, date: NaiveDate) -> Result<Vec<PriceRecord>, FetchError>;

    /// 指定開示日の財務諸表を取得。
    ///
    /// # Arguments
    ///
    /// * `disclosed_on` - 開示日
    ///
    /// # Returns
    ///
    /// 当日に開示された財務諸表レコード一覧。開示が無い日は空。
    ///
    /// # Errors
    ///
    /// - `FetchError::Transient` / `RateLimited`: 再試行枯渇後の一時的障害
    /// - `FetchError::AuthRejected`: 認証拒否
    /// - `FetchError::Rejected`: 不正な応答・ページ上限超過
    async fn fetch_statements(
        &self,
        disclosed_on: NaiveDate,
    ) -> Result<Vec<FinancialRecord>, FetchError>;

    /// データ提供者名 (ログ用)。
    fn provider_name(&self) -> &str;
}
