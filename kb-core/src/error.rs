use thiserror::Error;

/// Result alias for operations that fail with [`KbError`].
pub type KbResult<T> = Result<T, KbError>;

/// Error taxonomy shared across the platform. Every collaborator maps its
/// own failures onto one of these variants so the HTTP edge and the worker
/// runtime can apply one consistent policy (status code, retry, logging).
#[derive(Error, Debug, Clone)]
pub enum KbError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl KbError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether the caller should retry the operation without operator
    /// intervention (infrastructure hiccups), as opposed to a permanent
    /// rejection (bad input, missing record).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<anyhow::Error> for KbError {
    fn from(err: anyhow::Error) -> Self {
        Self::Transient(err.to_string())
    }
}
