//! J-Quants API クライアント。
//!
//! 全リクエストは共有スロットル → 再試行ドライバ → HTTP の順に通ります。
//! ページ送り (`pagination_key`) はクライアント内部で辿り切り、呼び出し側
//! には全ページ分のレコードだけを返します。
//!
//! # アーキテクチャ
//!
//! ```text
//! JQuantsClient
//! ├── TokenProvider (ID トークンのキャッシュと再発行)
//! ├── Throttle      (プロセス全体で共有する最小呼び出し間隔)
//! └── RetryPolicy   (一時的エラーの指数バックオフ再試行)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Asia::Tokyo;
use reqwest::StatusCode;
use tracing::debug;

use kabu_core::{
    CompanyRecord, FetchError, FinancialRecord, MarketDataProvider, PriceRecord,
};

use crate::auth::{summarize_body, JQuantsCredentials, TokenProvider};
use crate::retry::{with_retry, RetryPolicy};
use crate::throttle::Throttle;
use crate::types::{DailyQuotesResponse, ListedInfoResponse, PagedResponse, StatementsResponse};

/// J-Quants API のデフォルト URL。
pub const DEFAULT_BASE_URL: &str = "https://api.jquants.com/v1";

/// クライアント設定。
#[derive(Debug, Clone)]
pub struct JQuantsConfig {
    /// API ベース URL
    pub base_url: String,
    /// リクエストタイムアウト
    pub request_timeout: Duration,
    /// 最小呼び出し間隔
    pub min_interval: Duration,
    /// 再試行設定
    pub retry: RetryPolicy,
    /// 1 リソースあたりのページ数上限 (暴走ページネーション防止)
    pub page_limit: usize,
}

impl Default for JQuantsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            min_interval: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            page_limit: 100,
        }
    }
}

/// J-Quants API クライアント。
///
/// スロットルは `Arc` で保持するため、株価用と財務用など複数の取得
/// タスクから同じクライアントを共有しても呼び出し間隔はアカウント
/// 全体で守られます。
pub struct JQuantsClient {
    http: reqwest::Client,
    base_url: String,
    auth: TokenProvider,
    throttle: Arc<Throttle>,
    retry: RetryPolicy,
    page_limit: usize,
}

impl JQuantsClient {
    /// 設定と資格情報からクライアントを生成。
    ///
    /// # Errors
    /// HTTP クライアントの構築に失敗した場合 `FetchError::Rejected`。
    pub fn new(
        config: JQuantsConfig,
        credentials: JQuantsCredentials,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Rejected {
                resource: config.base_url.clone(),
                reason: format!("HTTP クライアントの構築に失敗: {e}"),
            })?;

        let auth = TokenProvider::new(http.clone(), config.base_url.clone(), credentials);
        Ok(Self {
            http,
            base_url: config.base_url,
            auth,
            throttle: Arc::new(Throttle::new(config.min_interval)),
            retry: config.retry,
            page_limit: config.page_limit,
        })
    }

    /// スロットルを差し替え。
    ///
    /// 複数クライアントでアカウント全体の呼び出し間隔を共有する場合や、
    /// テストで待機なしのスロットルに置き換える場合に使います。
    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// 使用中のスロットル。
    pub fn throttle(&self) -> Arc<Throttle> {
        Arc::clone(&self.throttle)
    }

    /// 1 ページ分を取得し、レコード配列と次ページカーソルを返します。
    async fn fetch_page<P: PagedResponse>(
        &self,
        resource: &str,
        params: &[(&str, String)],
        cursor: Option<&str>,
    ) -> Result<(Vec<P::Item>, Option<String>), FetchError> {
        self.throttle.wait().await;

        let token = self.auth.id_token().await?;
        let url = format!("{}{}", self.base_url, resource);

        let mut request = self.http.get(&url).bearer_auth(token).query(params);
        if let Some(key) = cursor {
            request = request.query(&[("pagination_key", key)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient {
                    resource: resource.to_string(),
                    reason: e.to_string(),
                }
            } else {
                FetchError::Rejected {
                    resource: resource.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(resource, status, response).await);
        }

        let parsed: P = response.json().await.map_err(|e| FetchError::Rejected {
            resource: resource.to_string(),
            reason: format!("応答の解析に失敗: {e}"),
        })?;
        Ok(parsed.into_parts())
    }

    /// カーソルが尽きるまで全ページを取得して連結します。
    ///
    /// 各ページの取得は個別に再試行されます。ページ数が上限を超えた
    /// 場合は応答不正とみなし、再試行対象外のエラーを返します。
    async fn fetch_all<P: PagedResponse>(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<P::Item>, FetchError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let (page_items, next) = with_retry(&self.retry, || {
                self.fetch_page::<P>(resource, params, cursor.as_deref())
            })
            .await?;

            items.extend(page_items);
            pages += 1;

            match next {
                Some(key) => {
                    if pages >= self.page_limit {
                        return Err(FetchError::Rejected {
                            resource: resource.to_string(),
                            reason: format!("ページ数が上限 {} を超過", self.page_limit),
                        });
                    }
                    cursor = Some(key);
                }
                None => break,
            }
        }

        debug!(resource, pages, records = items.len(), "全ページ取得完了");
        Ok(items)
    }
}

#[async_trait]
impl MarketDataProvider for JQuantsClient {
    async fn fetch_listed_companies(&self) -> Result<Vec<CompanyRecord>, FetchError> {
        let observed_on = today_tokyo();
        let items = self
            .fetch_all::<ListedInfoResponse>("/listed/info", &[])
            .await?;
        Ok(items
            .into_iter()
            .map(|item| item.into_record(observed_on))
            .collect())
    }

    async fn fetch_daily_quotes(&self, date: NaiveDate) -> Result<Vec<PriceRecord>, FetchError> {
        let params = [("date", date.format("%Y-%m-%d").to_string())];
        let items = self
            .fetch_all::<DailyQuotesResponse>("/prices/daily_quotes", &params)
            .await?;
        Ok(items.into_iter().map(|item| item.into_record()).collect())
    }

    async fn fetch_statements(
        &self,
        disclosed_on: NaiveDate,
    ) -> Result<Vec<FinancialRecord>, FetchError> {
        let params = [("date", disclosed_on.format("%Y-%m-%d").to_string())];
        let items = self
            .fetch_all::<StatementsResponse>("/fins/statements", &params)
            .await?;
        // 同一性キーを構成できない行は取り込まない
        Ok(items
            .into_iter()
            .filter_map(|item| item.into_record())
            .collect())
    }

    fn provider_name(&self) -> &str {
        "jquants"
    }
}

/// 東京時間での今日の日付。
pub fn today_tokyo() -> NaiveDate {
    chrono::Utc::now().with_timezone(&Tokyo).date_naive()
}

/// エラー応答を再試行可能性で分類します。
async fn classify_status(
    resource: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> FetchError {
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            resource: resource.to_string(),
            retry_after,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::AuthRejected(summarize_body(&body))
        }
        s if s.is_client_error() => FetchError::Rejected {
            resource: resource.to_string(),
            reason: format!("HTTP {status}: {}", summarize_body(&body)),
        },
        _ => FetchError::Transient {
            resource: resource.to_string(),
            reason: format!("HTTP {status}"),
        },
    }
}
