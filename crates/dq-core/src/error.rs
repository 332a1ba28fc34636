use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Document not ready: {0}")]
    DocumentNotReady(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The provider reported it is temporarily saturated.
    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Rejected by safety filter: {0}")]
    SafetyRejected(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {message} (status: {status})")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn document_not_ready(document_id: impl Into<String>) -> Self {
        Self::DocumentNotReady(document_id.into())
    }

    pub fn document_not_found(document_id: impl Into<String>) -> Self {
        Self::DocumentNotFound(document_id.into())
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::Overloaded(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials(message.into())
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::QuotaExceeded(message.into())
    }

    pub fn safety_rejected(message: impl Into<String>) -> Self {
        Self::SafetyRejected(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Only transient overload (and a missed per-call deadline) is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Overloaded(_) | Error::Timeout(_))
    }

    pub fn is_credentials_error(&self) -> bool {
        matches!(self, Error::Credentials(_))
    }

    /// Errors caused by the caller's input rather than by the provider.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::DocumentNotReady(_) | Error::DocumentNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
