//! API 再試行ユーティリティ。
//!
//! ネットワーク断やレート制限など一時的なエラーに対して指数バックオフで
//! 自動再試行します。認証拒否やページ上限超過など恒久的なエラーは
//! 再試行せず即時に返します。
//!
//! # 例
//!
//! ```rust,ignore
//! use kabu_jquants::retry::{RetryPolicy, with_retry};
//!
//! let policy = RetryPolicy::default();
//! let result = with_retry(&policy, || async {
//!     client.daily_quotes(date).await
//! }).await;
//! ```

use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::{debug, warn};

use kabu_core::FetchError;

/// 再試行設定。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大再試行回数 (初回試行を除く)。
    pub max_retries: u32,
    /// 基本待機時間 (エラー側に指定が無いとき使用)。
    pub base_delay: Duration,
    /// 最大待機時間。
    pub max_delay: Duration,
    /// バックオフ倍率。
    pub backoff_multiplier: f64,
    /// 待機時間にジッター (±25%) を加えるか。
    pub add_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 再試行なし (単一試行)。
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 次の一手を判定。
    ///
    /// `attempt` は失敗した試行の番号 (0 起点)。一時的エラーで回数が
    /// 残っていれば待機時間付きの [`RetryDecision::Backoff`] を返します。
    pub fn decide(&self, attempt: u32, error: &FetchError) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::Abort;
        }
        if attempt >= self.max_retries {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Backoff {
            delay: self.delay_for(attempt, error),
        }
    }

    /// 待機時間計算。
    fn delay_for(&self, attempt: u32, error: &FetchError) -> Duration {
        // サーバー指定の待機時間 (Retry-After) があれば優先
        let base = error.retry_after().unwrap_or(self.base_delay);

        let delay = if attempt > 0 {
            let multiplier = self.backoff_multiplier.powi(attempt as i32);
            Duration::from_secs_f64(base.as_secs_f64() * multiplier)
        } else {
            base
        };

        let delay = delay.min(self.max_delay);

        if self.add_jitter {
            let jitter_range = delay.as_millis() as f64 * 0.25;
            let jitter = rand::thread_rng().gen_range(-1.0..=1.0) * jitter_range;
            Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
        } else {
            delay
        }
    }
}

/// 失敗した試行に対する次の一手。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// 待機して再試行。
    Backoff { delay: Duration },
    /// 再試行回数を使い切った。
    Exhausted,
    /// 再試行対象外のエラー。
    Abort,
}

/// 再試行付きで非同期処理を実行。
///
/// # Arguments
/// * `policy` - 再試行設定
/// * `operation` - 実行する非同期処理
///
/// # Returns
/// * `Ok(T)` - 処理の成功結果
/// * `Err(FetchError)` - 再試行しても失敗したときの最後のエラー
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        attempts = attempt + 1,
                        total_delay_ms = total_delay.as_millis(),
                        "再試行後に成功"
                    );
                }
                return Ok(result);
            }
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::Abort => {
                    debug!(error = %e, "再試行対象外のエラー、即時失敗");
                    return Err(e);
                }
                RetryDecision::Exhausted => {
                    warn!(
                        error = %e,
                        attempts = attempt + 1,
                        max_retries = policy.max_retries,
                        "最大再試行回数を超過"
                    );
                    return Err(e);
                }
                RetryDecision::Backoff { delay } => {
                    total_delay += delay;
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis(),
                        "再試行待機中"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
