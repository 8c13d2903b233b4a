//! Error types for remote service calls and the publish transaction.
//!
//! [`ServiceError`] covers a single HTTP exchange with one of the external
//! collaborators. [`PublishError`] wraps those failures with the publish step
//! they happened in, and carries the one outcome the caller must treat
//! differently: [`PublishError::RefConflict`], where the commit exists but the
//! branch was not moved.

use thiserror::Error;

/// Failure of a single call to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request exceeded its deadline.
    #[error("{service}: request timed out")]
    Timeout { service: &'static str },

    /// Connection, TLS or body transfer failure.
    #[error("{service}: request failed: {source}")]
    Transport {
        service: &'static str,
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service}: unexpected status {status}")]
    Status { service: &'static str, status: u16 },

    /// The response body could not be decoded.
    #[error("{service}: malformed response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// An endpoint URL could not be built.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ServiceError {
    pub fn from_reqwest(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ServiceError::Timeout { service }
        } else if source.is_decode() {
            ServiceError::Decode {
                service,
                message: source.to_string(),
            }
        } else {
            ServiceError::Transport { service, source }
        }
    }

    /// Transient failures worth another attempt under a retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout { .. } => true,
            ServiceError::Transport { source, .. } => source.is_connect() || source.is_request(),
            ServiceError::Status { status, .. } => *status >= 500 || *status == 429,
            ServiceError::Decode { .. } | ServiceError::InvalidUrl(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of the day's publish transaction.
///
/// [`PublishError::RefConflict`] and [`PublishError::RefUpdate`] happen after
/// the commit was created, and both carry its SHA. A conflict leaves the
/// branch untouched. A failed update may or may not have moved the branch, so
/// check it against the commit before retrying. Every other variant means
/// nothing was committed. The objects stay in the store either way.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("listing objects under {prefix} failed: {source}")]
    List {
        prefix: String,
        source: ServiceError,
    },

    #[error("downloading {key} failed: {source}")]
    Download { key: String, source: ServiceError },

    /// A listed key cannot be mapped to a repository path.
    #[error("object key {0} does not belong to the day being published")]
    ForeignKey(String),

    #[error("{step} failed: {source}")]
    VersionControl {
        step: &'static str,
        source: ServiceError,
    },

    /// The commit was created but the branch moved before the ref update.
    #[error("branch {branch} moved; commit {commit} was created but not linked")]
    RefConflict { branch: String, commit: String },

    /// The commit was created but the ref update call itself failed.
    #[error("updating branch {branch} to commit {commit} failed: {source}")]
    RefUpdate {
        branch: String,
        commit: String,
        source: ServiceError,
    },
}
