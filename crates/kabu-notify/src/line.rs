//! LINE Messaging API 通知チャネル。
//!
//! チャネルアクセストークンで認証し、ユーザー ID 指定時は push、
//! 未指定時は broadcast でテキストメッセージを送ります。

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::types::{NotificationSink, NotifyError, NotifyResult};

/// LINE Messaging API のデフォルトエンドポイント。
pub const DEFAULT_API_URL: &str = "https://api.line.me/v2/bot";

/// LINE のテキストメッセージ上限文字数。超過分は切り詰めます。
const MAX_MESSAGE_CHARS: usize = 2000;

/// LINE 通知設定。
#[derive(Clone)]
pub struct LineConfig {
    /// API ベース URL (テストで差し替え可能)
    pub api_url: String,
    /// チャネルアクセストークン
    pub channel_access_token: SecretString,
    /// 送信先ユーザー ID (未指定なら broadcast)
    pub user_id: Option<String>,
    /// 送信の有効・無効
    pub enabled: bool,
}

impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("api_url", &self.api_url)
            .field("channel_access_token", &"***")
            .field("user_id", &self.user_id)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl LineConfig {
    pub fn new(channel_access_token: SecretString) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            channel_access_token,
            user_id: None,
            enabled: true,
        }
    }

    /// 送信先ユーザーを設定 (push 送信になる)。
    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// 環境変数から設定を生成。トークン未設定なら `None`。
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("LINE_CHANNEL_ACCESS_TOKEN").ok()?;
        let user_id = std::env::var("LINE_USER_ID").ok();
        let enabled = std::env::var("LINE_ENABLED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        Some(Self {
            api_url: DEFAULT_API_URL.to_string(),
            channel_access_token: SecretString::from(token),
            user_id,
            enabled,
        })
    }
}

/// LINE 通知送信器。
pub struct LineSender {
    config: LineConfig,
    client: reqwest::Client,
}

impl LineSender {
    pub fn new(config: LineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// 環境変数から送信器を生成。
    pub fn from_env() -> Option<Self> {
        LineConfig::from_env().map(Self::new)
    }

    /// メッセージ本文を送信。上限を超える本文は切り詰めます。
    async fn push(&self, message: &str) -> NotifyResult<()> {
        let text = truncate_message(message);

        let (endpoint, payload) = match &self.config.user_id {
            Some(user_id) => (
                format!("{}/message/push", self.config.api_url),
                json!({
                    "to": user_id,
                    "messages": [{"type": "text", "text": text}],
                }),
            ),
            None => (
                format!("{}/message/broadcast", self.config.api_url),
                json!({
                    "messages": [{"type": "text", "text": text}],
                }),
            ),
        };

        debug!(endpoint = %endpoint, "LINE メッセージを送信中");
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(self.config.channel_access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(NotifyError::Network)?;

        if response.status().is_success() {
            info!("LINE 通知送信完了");
            return Ok(());
        }

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("LINE レート制限超過");
            return Err(NotifyError::RateLimited(retry_after.unwrap_or(60)));
        }

        Err(NotifyError::SendFailed(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl NotificationSink for LineSender {
    async fn send_text(&self, message: &str) -> NotifyResult<()> {
        if !self.is_enabled() {
            debug!("LINE 通知が無効のためスキップ");
            return Ok(());
        }
        self.push(message).await
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn name(&self) -> &str {
        "line"
    }
}

/// 上限を超えるメッセージを切り詰めます。
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let head: String = message.chars().take(MAX_MESSAGE_CHARS - 100).collect();
    format!("{head}\n\n（メッセージが長いため省略されました）")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sender(server: &mockito::Server, user_id: Option<&str>) -> LineSender {
        let mut config = LineConfig::new(SecretString::from("channel-token"));
        config.api_url = server.url();
        if let Some(id) = user_id {
            config = config.with_user_id(id.to_string());
        }
        LineSender::new(config)
    }

    #[tokio::test]
    async fn test_push_to_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/message/push")
            .match_header("authorization", "Bearer channel-token")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "to": "U123",
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let sender = test_sender(&server, Some("U123"));
        sender.send_text("変動通知").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_broadcast_without_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/message/broadcast")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let sender = test_sender(&server, None);
        sender.send_text("変動通知").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/message/broadcast")
            .with_status(429)
            .with_header("Retry-After", "30")
            .create_async()
            .await;

        let sender = test_sender(&server, None);
        let error = sender.send_text("x").await.unwrap_err();
        assert!(matches!(error, NotifyError::RateLimited(30)));
    }

    #[tokio::test]
    async fn test_auth_failure_is_send_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/message/broadcast")
            .with_status(401)
            .with_body(r#"{"message": "invalid token"}"#)
            .create_async()
            .await;

        let sender = test_sender(&server, None);
        let error = sender.send_text("x").await.unwrap_err();
        assert!(matches!(error, NotifyError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_disabled_sender_skips_request() {
        let server = mockito::Server::new_async().await;
        let mut config = LineConfig::new(SecretString::from("channel-token"));
        config.api_url = server.url();
        config.enabled = false;

        let sender = LineSender::new(config);
        assert!(!sender.is_enabled());
        // モックを張っていないので、リクエストが飛べば失敗する
        sender.send_text("x").await.unwrap();
    }

    #[test]
    fn test_long_message_is_truncated() {
        let long = "あ".repeat(3000);
        let truncated = truncate_message(&long);
        assert!(truncated.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(truncated.contains("省略"));
    }

    #[test]
    fn test_debug_masks_token() {
        let config = LineConfig::new(SecretString::from("secret-token"));
        let output = format!("{config:?}");
        assert!(!output.contains("secret-token"));
    }
}
