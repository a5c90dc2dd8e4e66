use error_stack::Report;
use thiserror::Error;

use super::{StorageError, UpstreamDetail};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The caller sent something unusable. Nothing was sent upstream.
    #[error("{0}")]
    Validation(String),

    /// The remote store rejected or failed the probe or the write.
    #[error("upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl UploadError {
    pub fn no_file() -> Self {
        UploadError::Validation("No file uploaded".into())
    }
}

impl From<Report<StorageError>> for UploadError {
    fn from(report: Report<StorageError>) -> Self {
        match report.downcast_ref::<UpstreamDetail>() {
            Some(detail) => UploadError::Upstream {
                status: detail.status.map(|s| s.as_u16()),
                message: detail.message.clone(),
            },
            None => UploadError::Upstream {
                status: None,
                message: report.current_context().to_string(),
            },
        }
    }
}
