//! 環境変数ベースの設定モジュール。

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use kabu_jquants::{JQuantsConfig, JQuantsCredentials, RetryPolicy, DEFAULT_BASE_URL};

use crate::error::{CollectorError, Result};

/// Collector 全体の設定。
///
/// 起動時に一度だけ構築・検証し、以後は不変として扱います。
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// データセットの出力ディレクトリ
    pub output_dir: PathBuf,
    /// J-Quants API 設定
    pub api: ApiConfig,
    /// 同期動作の設定
    pub sync: SyncSettings,
}

/// J-Quants API 設定。
#[derive(Clone)]
pub struct ApiConfig {
    /// API ベース URL
    pub base_url: String,
    /// 登録メールアドレス
    pub mail_address: Option<String>,
    /// パスワード
    pub password: Option<SecretString>,
    /// 発行済みリフレッシュトークン (設定時はログインを省略)
    pub refresh_token: Option<SecretString>,
    /// リクエストタイムアウト (ミリ秒)
    pub request_timeout_ms: u64,
    /// API 呼び出し間の最小間隔 (ミリ秒)
    pub request_delay_ms: u64,
    /// 一時的エラーの最大再試行回数
    pub max_retries: u32,
    /// 1 リソースあたりのページ数上限
    pub page_limit: usize,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("mail_address", &self.mail_address)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("max_retries", &self.max_retries)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

/// 同期動作の設定。
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// 一括取得時の遡及日数
    pub history_days: i64,
    /// 週末を非営業日として扱うか
    pub skip_weekends: bool,
    /// CP932 互換コピーを出力するか
    pub write_sjis_copy: bool,
}

impl CollectorConfig {
    /// 環境変数から設定をロード (`.env` があれば読み込む)。
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let output_dir =
            PathBuf::from(std::env::var("KABU_OUTPUT_DIR").unwrap_or_else(|_| "./data".to_string()));

        Ok(Self {
            output_dir,
            api: ApiConfig {
                base_url: std::env::var("JQUANTS_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                mail_address: std::env::var("JQUANTS_MAIL_ADDRESS").ok(),
                password: std::env::var("JQUANTS_PASSWORD").ok().map(SecretString::from),
                refresh_token: std::env::var("JQUANTS_REFRESH_TOKEN")
                    .ok()
                    .map(SecretString::from),
                request_timeout_ms: env_var_parse("JQUANTS_REQUEST_TIMEOUT_MS", 30_000),
                request_delay_ms: env_var_parse("JQUANTS_REQUEST_DELAY_MS", 100),
                max_retries: env_var_parse("JQUANTS_MAX_RETRIES", 3),
                page_limit: env_var_parse("JQUANTS_PAGE_LIMIT", 100),
            },
            sync: SyncSettings {
                history_days: env_var_parse("SYNC_HISTORY_DAYS", 730),
                skip_weekends: env_var_bool("SYNC_SKIP_WEEKENDS", true),
                write_sjis_copy: env_var_bool("STORE_SJIS_COPY", false),
            },
        })
    }

    /// 起動時検証。資格情報と出力先は実行前に確定していなければならない。
    pub fn validate(&self) -> Result<()> {
        if !self.credentials().is_configured() {
            return Err(CollectorError::Config(
                "JQUANTS_REFRESH_TOKEN か JQUANTS_MAIL_ADDRESS / JQUANTS_PASSWORD の組を設定してください"
                    .to_string(),
            ));
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            CollectorError::Config(format!(
                "出力ディレクトリ {} を作成できません: {e}",
                self.output_dir.display()
            ))
        })?;
        Ok(())
    }

    /// API クライアント用の資格情報。
    pub fn credentials(&self) -> JQuantsCredentials {
        JQuantsCredentials {
            mail_address: self.api.mail_address.clone(),
            password: self.api.password.clone(),
            refresh_token: self.api.refresh_token.clone(),
        }
    }

    /// API クライアント設定に変換。
    pub fn jquants_config(&self) -> JQuantsConfig {
        JQuantsConfig {
            base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_millis(self.api.request_timeout_ms),
            min_interval: Duration::from_millis(self.api.request_delay_ms),
            retry: RetryPolicy {
                max_retries: self.api.max_retries,
                ..Default::default()
            },
            page_limit: self.api.page_limit,
        }
    }

    /// スナップショット置き場のパス。
    pub fn snapshot_dir(&self) -> PathBuf {
        self.output_dir.join("snapshots")
    }
}

/// 環境変数から値をパース (失敗時はデフォルト値)。
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 環境変数から bool 値をパース。
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CollectorConfig {
        CollectorConfig {
            output_dir: std::env::temp_dir().join("kabu_config_test"),
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                mail_address: None,
                password: None,
                refresh_token: Some(SecretString::from("rt")),
                request_timeout_ms: 30_000,
                request_delay_ms: 100,
                max_retries: 3,
                page_limit: 100,
            },
            sync: SyncSettings {
                history_days: 730,
                skip_weekends: true,
                write_sjis_copy: false,
            },
        }
    }

    #[test]
    fn test_validate_accepts_refresh_token() {
        let config = base_config();
        assert!(config.validate().is_ok());
        let _ = std::fs::remove_dir_all(&config.output_dir);
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let mut config = base_config();
        config.api.refresh_token = None;

        let error = config.validate().unwrap_err();
        assert!(matches!(error, CollectorError::Config(_)));
    }

    #[test]
    fn test_jquants_config_conversion() {
        let config = base_config();
        let jq = config.jquants_config();

        assert_eq!(jq.request_timeout, Duration::from_secs(30));
        assert_eq!(jq.min_interval, Duration::from_millis(100));
        assert_eq!(jq.retry.max_retries, 3);
        assert_eq!(jq.page_limit, 100);
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut config = base_config();
        config.api.password = Some(SecretString::from("hunter2"));

        let output = format!("{config:?}");
        assert!(!output.contains("hunter2"));
    }
}
