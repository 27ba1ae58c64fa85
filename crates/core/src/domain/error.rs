use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_API_KEY")]
    ApiKeyMissing,
    #[serde(rename = "E_HTTP")]
    Http,
    #[serde(rename = "E_MALFORMED")]
    MalformedResponse,
    #[serde(rename = "E_CANCELLED")]
    Cancelled,
    #[serde(rename = "E_CHUNKING")]
    Chunking,
    #[serde(rename = "E_SUMMARY")]
    Summary,
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
    #[serde(rename = "E_STORAGE")]
    Storage,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

/// アプリケーションエラー（イベントペイロード兼用）
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Storage,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn summary(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Summary,
            message: msg.into(),
            recoverable: true,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// 翻訳リクエスト・チャンク分割で発生するエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("Chunking failed: {0}")]
    ChunkingSetup(String),
    #[error("{provider} API key is not set. Please check the API key configuration.")]
    ApiKeyMissing { provider: String },
    #[error("Error from {provider} API: {status} - {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("Invalid API response format from {provider}: {detail}")]
    MalformedResponse { provider: String, detail: String },
    #[error("Translation cancelled")]
    Cancelled,
    #[error("Unsupported model selected: {0}")]
    UnsupportedModel(String),
    #[error("Request to {provider} failed: {detail}")]
    Transport { provider: String, detail: String },
}

impl TranslateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// チャンク単位で続行/中止を選べるエラーか
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::ChunkingSetup(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ChunkingSetup(_) => ErrorCode::Chunking,
            Self::ApiKeyMissing { .. } => ErrorCode::ApiKeyMissing,
            Self::Http { .. } | Self::Transport { .. } => ErrorCode::Http,
            Self::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::UnsupportedModel(_) => ErrorCode::InvalidState,
        }
    }
}

impl From<&TranslateError> for AppError {
    fn from(err: &TranslateError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

/// バッチ実行の開始自体を拒否する理由
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("A translation run is already in progress")]
    AlreadyRunning,
    #[error("Please enter text to translate")]
    EmptyInput,
}
