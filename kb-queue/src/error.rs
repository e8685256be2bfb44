use kb_core::KbError;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for broker operations.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid lease token")]
    InvalidLeaseToken,

    #[error("lease has expired")]
    LeaseExpired,

    #[error("job is already in a terminal state")]
    JobAlreadyTerminal,

    #[error("job type not registered: {0}")]
    JobTypeNotRegistered(String),

    #[error("backend does not support feature: {0}")]
    BackendUnsupported(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("worker shutdown")]
    WorkerShutdown,

    #[error("processor error: {0}")]
    Processor(#[from] KbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
