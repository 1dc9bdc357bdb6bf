//! ストア層のエラー型。

use thiserror::Error;

/// Dataset Store のエラー。
#[derive(Debug, Error)]
pub enum StoreError {
    /// ファイル入出力の失敗
    #[error("入出力エラー ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV の解析・書き出しの失敗
    #[error("CSV 処理に失敗しました ({path}): {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// 全フォールバックで文字コードを判別できなかった
    #[error("文字コードを判別できません ({path}): 試行した符号化 {tried:?}")]
    Decode {
        path: String,
        tried: Vec<&'static str>,
    },

    /// 格納済みデータの整合性違反 (日付列の解析不能など)
    #[error("データ整合性エラー ({path}): {reason}")]
    Integrity { path: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn integrity(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Integrity {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
