use std::fmt;

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("GitLab storage error: {0}")]
    GitLab(#[from] GitLabStorageError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitLabStorageError {
    #[error("GitLab API error")]
    ApiError,

    #[error("Missing data in response: {0}")]
    MissingData(String),

    #[error("Authentication error")]
    AuthError,

    #[error("Transport error")]
    Transport,

    #[error("Resource not found")]
    NotFound,

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<StatusCode> for GitLabStorageError {
    fn from(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => GitLabStorageError::NotFound,
            StatusCode::FORBIDDEN => GitLabStorageError::Forbidden,
            StatusCode::UNAUTHORIZED => GitLabStorageError::AuthError,
            StatusCode::TOO_MANY_REQUESTS => GitLabStorageError::RateLimitExceeded,
            _ => GitLabStorageError::ApiError,
        }
    }
}

/// What the remote store said when a call failed.
///
/// Attached to every failing [`StorageResult`](super::StorageResult) report so
/// callers can surface the upstream status and message without parsing the
/// printable frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamDetail {
    /// `None` when the request never got a response.
    pub status: Option<StatusCode>,
    pub message: String,
}

impl UpstreamDetail {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for UpstreamDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status.as_u16()),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GitLabStorageError::from(StatusCode::NOT_FOUND),
            GitLabStorageError::NotFound
        );
        assert_eq!(
            GitLabStorageError::from(StatusCode::UNAUTHORIZED),
            GitLabStorageError::AuthError
        );
        assert_eq!(
            GitLabStorageError::from(StatusCode::FORBIDDEN),
            GitLabStorageError::Forbidden
        );
        assert_eq!(
            GitLabStorageError::from(StatusCode::TOO_MANY_REQUESTS),
            GitLabStorageError::RateLimitExceeded
        );
        assert_eq!(
            GitLabStorageError::from(StatusCode::BAD_REQUEST),
            GitLabStorageError::ApiError
        );
    }

    #[test]
    fn test_upstream_detail_display() {
        let detail = UpstreamDetail::new(StatusCode::UNAUTHORIZED, "401 Unauthorized");
        assert_eq!(detail.to_string(), "401 Unauthorized (401)");

        let detail = UpstreamDetail::transport("connection refused");
        assert_eq!(detail.to_string(), "connection refused");
    }
}
