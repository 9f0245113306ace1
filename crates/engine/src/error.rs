use stride_platform::StoreError;

/// Errors that abort an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The change token is no longer valid. The caller must issue a new one
    /// and accept a gap in history.
    #[error("Change token has expired")]
    TokenExpired,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(id) => EngineError::SessionNotFound(id),
            StoreError::Unavailable(reason) => EngineError::Unavailable(reason),
            StoreError::InvalidRecord(reason) => EngineError::InvalidRecord(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
