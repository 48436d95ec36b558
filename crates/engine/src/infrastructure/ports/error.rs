//! Error types for port operations.

use quillcast_domain::Platform;

/// Record store errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Storage operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Stored row could not be converted to or from a record.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Failures from the text generation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Network failure, timeout, rate limit or 5xx. Worth another attempt.
    #[error("Generation backend unavailable: {0}")]
    Transient(String),
    /// Rejected request, bad credentials, malformed stream.
    #[error("Generation request rejected: {0}")]
    Terminal(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failures from a publishing platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("{platform} unavailable: {message}")]
    Transient { platform: Platform, message: String },
    #[error("{platform} rejected the request: {message}")]
    Terminal { platform: Platform, message: String },
    #[error("platform not configured")]
    NotConfigured(Platform),
}

impl PublishError {
    pub fn transient(platform: Platform, message: impl ToString) -> Self {
        Self::Transient {
            platform,
            message: message.to_string(),
        }
    }

    pub fn terminal(platform: Platform, message: impl ToString) -> Self {
        Self::Terminal {
            platform,
            message: message.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Credential verification failures. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,
    #[error("Invalid credential")]
    InvalidCredential,
}
