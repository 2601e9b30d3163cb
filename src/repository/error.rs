// ABOUTME: Typed errors returned by content repository implementations
// ABOUTME: NotFound is kept distinct so callers can fall back to creating objects

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested object does not exist (HTTP 404)
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Credentials were rejected or the user lacks a policy (HTTP 401/403)
    #[error("repository denied access ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("repository API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request to repository failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode repository response: {0}")]
    Decode(String),

    #[error("invalid repository request: {0}")]
    InvalidInput(String),
}

impl RepositoryError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Errors worth retrying: network failures and server-side 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
