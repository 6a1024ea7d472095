use thiserror::Error;

/// Errors surfaced by stores and their backing mechanisms.
///
/// Store operations never return these synchronously; they arrive through the
/// [`Completion`](crate::sync::Completion) of the operation that failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("failed to schedule background work: {0}")]
    Spawn(String),

    #[error("background work was dropped before it completed")]
    Abandoned,

    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
