//! Error types shared by the HTTP collaborator clients.

use thiserror::Error;

/// Failure of a request/response call to a collaborator service.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
}
