//! 通知チャネルの共通型。

use async_trait::async_trait;
use thiserror::Error;

/// 通知エラー。
#[derive(Debug, Error)]
pub enum NotifyError {
    /// ネットワーク障害
    #[error("通知のネットワークエラー: {0}")]
    Network(#[from] reqwest::Error),

    /// チャネル側のレート制限 (再試行までの待機秒数)
    #[error("通知チャネルのレート制限超過 ({0} 秒待機)")]
    RateLimited(u64),

    /// 送信拒否 (認証エラー・不正なペイロードなど)
    #[error("通知の送信に失敗しました: {0}")]
    SendFailed(String),

    /// スナップショットファイルの入出力失敗
    #[error("スナップショットの入出力エラー ({path}): {reason}")]
    Snapshot { path: String, reason: String },
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// 通知チャネルの抽象化。
///
/// 差分レポートを整形済みテキストとして受け取り、成否だけを返します。
/// チャネル固有の仕様 (ペイロード形式、エンドポイント) は実装側に
/// 閉じ込めます。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// テキストメッセージを送信。
    async fn send_text(&self, message: &str) -> NotifyResult<()>;

    /// チャネルが有効か (無効なら送信は黙ってスキップされる)。
    fn is_enabled(&self) -> bool;

    /// チャネル名 (ログ用)。
    fn name(&self) -> &str;
}
