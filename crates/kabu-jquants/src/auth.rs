//! J-Quants 認証。
//!
//! 二段階のトークンフローを扱います。
//!
//! 1. `POST /token/auth_user` にメールアドレスとパスワードを送り
//!    リフレッシュトークンを得る (設定済みならこの段は省略)
//! 2. `POST /token/auth_refresh` でリフレッシュトークンを ID トークンに交換
//!
//! ID トークンは 24 時間有効なのでプロバイダ内部にキャッシュし、期限が
//! 近づいたら自動で再取得します。

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use kabu_core::FetchError;

/// ID トークンの有効期間 (仕様上 24 時間)。
const ID_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// 期限切れ間際に再取得へ入るマージン。
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// J-Quants の資格情報。
///
/// リフレッシュトークンを直接設定するか、メールアドレスとパスワードの
/// 組を設定します。両方あればリフレッシュトークンを優先します。
#[derive(Clone, Default)]
pub struct JQuantsCredentials {
    pub mail_address: Option<String>,
    pub password: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
}

impl std::fmt::Debug for JQuantsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JQuantsCredentials")
            .field("mail_address", &self.mail_address)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl JQuantsCredentials {
    /// リフレッシュトークン方式。
    pub fn from_refresh_token(refresh_token: SecretString) -> Self {
        Self {
            refresh_token: Some(refresh_token),
            ..Default::default()
        }
    }

    /// メールアドレスとパスワード方式。
    pub fn from_login(mail_address: String, password: SecretString) -> Self {
        Self {
            mail_address: Some(mail_address),
            password: Some(password),
            refresh_token: None,
        }
    }

    /// いずれかの方式で認証できる状態か。
    pub fn is_configured(&self) -> bool {
        self.refresh_token.is_some()
            || (self.mail_address.is_some() && self.password.is_some())
    }
}

/// キャッシュ中のトークンと期限。
struct TokenState {
    id_token: Option<String>,
    expires_at: Instant,
}

/// ID トークンの取得とキャッシュ。
///
/// 取得タスク全体で `Arc` 共有する前提です。取得中はロックを保持するため
/// 同時に期限切れを踏んでも発行リクエストは 1 回に抑えられます。
pub struct TokenProvider {
    http: reqwest::Client,
    base_url: String,
    credentials: JQuantsCredentials,
    state: Mutex<TokenState>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, base_url: String, credentials: JQuantsCredentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            state: Mutex::new(TokenState {
                id_token: None,
                expires_at: Instant::now(),
            }),
        }
    }

    /// 有効な ID トークンを返す。キャッシュが切れていれば再取得。
    ///
    /// # Errors
    /// 資格情報が無効なら `FetchError::AuthRejected`、通信断なら
    /// `FetchError::Transient` を返します。
    pub async fn id_token(&self) -> Result<String, FetchError> {
        let mut state = self.state.lock().await;

        if let Some(token) = &state.id_token {
            if Instant::now() < state.expires_at {
                return Ok(token.clone());
            }
        }

        let refresh_token = self.obtain_refresh_token().await?;
        let id_token = self.request_id_token(&refresh_token).await?;

        state.expires_at = Instant::now() + (ID_TOKEN_LIFETIME - EXPIRY_MARGIN);
        state.id_token = Some(id_token.clone());
        debug!("ID トークンを更新");
        Ok(id_token)
    }

    /// リフレッシュトークンを返す。設定済みならそれを、無ければ
    /// メールアドレスとパスワードで発行します。
    async fn obtain_refresh_token(&self) -> Result<String, FetchError> {
        if let Some(token) = &self.credentials.refresh_token {
            return Ok(token.expose_secret().to_string());
        }

        let (mail, password) = match (&self.credentials.mail_address, &self.credentials.password) {
            (Some(mail), Some(password)) => (mail.as_str(), password),
            _ => {
                return Err(FetchError::AuthRejected(
                    "リフレッシュトークンかメールアドレス/パスワードのいずれかが必要です"
                        .to_string(),
                ))
            }
        };

        debug!(mail_address = mail, "リフレッシュトークンを取得中");
        let url = format!("{}/token/auth_user", self.base_url);
        let body = serde_json::json!({
            "mailaddress": mail,
            "password": password.expose_secret(),
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("/token/auth_user", e))?;

        let parsed: AuthUserResponse = parse_token_response("/token/auth_user", response).await?;
        Ok(parsed.refresh_token)
    }

    async fn request_id_token(&self, refresh_token: &str) -> Result<String, FetchError> {
        debug!("ID トークンを取得中");
        let url = format!("{}/token/auth_refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("refreshtoken", refresh_token)])
            .send()
            .await
            .map_err(|e| transport_error("/token/auth_refresh", e))?;

        let parsed: AuthRefreshResponse =
            parse_token_response("/token/auth_refresh", response).await?;
        Ok(parsed.id_token)
    }
}

// ==== wire 型 ====

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthRefreshResponse {
    #[serde(rename = "idToken")]
    id_token: String,
}

// ==== エラー変換 ====

fn transport_error(resource: &str, error: reqwest::Error) -> FetchError {
    FetchError::Transient {
        resource: resource.to_string(),
        reason: error.to_string(),
    }
}

/// トークンエンドポイントの応答をエラー分類付きで解析。
///
/// 資格情報の誤りは 400 で返ってくるため、4xx はまとめて認証拒否として
/// 扱います。
async fn parse_token_response<T: DeserializeOwned>(
    resource: &str,
    response: reqwest::Response,
) -> Result<T, FetchError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| FetchError::Rejected {
            resource: resource.to_string(),
            reason: format!("応答の解析に失敗: {e}"),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            resource: resource.to_string(),
            retry_after: None,
        },
        s if s.is_client_error() => FetchError::AuthRejected(summarize_body(&body)),
        _ => FetchError::Transient {
            resource: resource.to_string(),
            reason: format!("HTTP {status}"),
        },
    })
}

/// エラー応答の本文を要約。`{"message": ...}` 形式ならメッセージを取り出す。
pub(crate) fn summarize_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn provider(server: &mockito::Server, credentials: JQuantsCredentials) -> TokenProvider {
        TokenProvider::new(reqwest::Client::new(), server.url(), credentials)
    }

    #[tokio::test]
    async fn test_login_flow_issues_id_token() {
        let mut server = mockito::Server::new_async().await;
        let auth_user = server
            .mock("POST", "/token/auth_user")
            .match_body(Matcher::Json(serde_json::json!({
                "mailaddress": "user@example.com",
                "password": "pw",
            })))
            .with_status(200)
            .with_body(r#"{"refreshToken": "rt-1"}"#)
            .create_async()
            .await;
        let auth_refresh = server
            .mock("POST", "/token/auth_refresh")
            .match_query(Matcher::UrlEncoded("refreshtoken".into(), "rt-1".into()))
            .with_status(200)
            .with_body(r#"{"idToken": "id-1"}"#)
            .create_async()
            .await;

        let credentials = JQuantsCredentials::from_login(
            "user@example.com".to_string(),
            SecretString::from("pw"),
        );
        let token = provider(&server, credentials).id_token().await.unwrap();

        assert_eq!(token, "id-1");
        auth_user.assert_async().await;
        auth_refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_token_skips_login() {
        let mut server = mockito::Server::new_async().await;
        let auth_user = server
            .mock("POST", "/token/auth_user")
            .expect(0)
            .create_async()
            .await;
        let auth_refresh = server
            .mock("POST", "/token/auth_refresh")
            .match_query(Matcher::UrlEncoded(
                "refreshtoken".into(),
                "rt-direct".into(),
            ))
            .with_status(200)
            .with_body(r#"{"idToken": "id-2"}"#)
            .create_async()
            .await;

        let credentials = JQuantsCredentials::from_refresh_token(SecretString::from("rt-direct"));
        let token = provider(&server, credentials).id_token().await.unwrap();

        assert_eq!(token, "id-2");
        auth_user.assert_async().await;
        auth_refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_id_token_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let auth_refresh = server
            .mock("POST", "/token/auth_refresh")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"idToken": "id-3"}"#)
            .expect(1)
            .create_async()
            .await;

        let credentials = JQuantsCredentials::from_refresh_token(SecretString::from("rt"));
        let provider = provider(&server, credentials);

        assert_eq!(provider.id_token().await.unwrap(), "id-3");
        assert_eq!(provider.id_token().await.unwrap(), "id-3");
        auth_refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_refresh_token_is_auth_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token/auth_refresh")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message": "The incoming token is invalid"}"#)
            .create_async()
            .await;

        let credentials = JQuantsCredentials::from_refresh_token(SecretString::from("bad"));
        let error = provider(&server, credentials).id_token().await.unwrap_err();

        match error {
            FetchError::AuthRejected(reason) => {
                assert!(reason.contains("invalid"));
            }
            other => panic!("認証拒否が返るはず: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_without_request() {
        let credentials = JQuantsCredentials::default();
        assert!(!credentials.is_configured());

        let provider = TokenProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            credentials,
        );
        let error = provider.id_token().await.unwrap_err();
        assert!(matches!(error, FetchError::AuthRejected(_)));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let credentials = JQuantsCredentials::from_login(
            "user@example.com".to_string(),
            SecretString::from("super-secret"),
        );
        let output = format!("{credentials:?}");
        assert!(output.contains("user@example.com"));
        assert!(!output.contains("super-secret"));
    }

    #[test]
    fn test_summarize_body_extracts_message() {
        assert_eq!(
            summarize_body(r#"{"message": "Quota exceeded"}"#),
            "Quota exceeded"
        );
        assert_eq!(summarize_body("  plain text  "), "plain text");
    }
}
