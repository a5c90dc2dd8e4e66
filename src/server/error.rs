use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use error_stack::Report;
use serde_json::json;
use tracing::error;

use crate::error::{StorageError, UploadError, UpstreamDetail};

/// Failure of a relay route, rendered as `{ "error", "details"? }`.
#[derive(Debug)]
pub enum ApiError {
    /// Unusable request. Nothing was sent upstream.
    BadRequest(String),
    /// GitLab rejected or failed the call.
    Upstream {
        error: &'static str,
        details: String,
    },
}

impl ApiError {
    pub fn missing(field: &str) -> Self {
        ApiError::BadRequest(format!("Missing field: {}", field))
    }

    pub fn upstream(error: &'static str, report: Report<StorageError>) -> Self {
        let detail = report.downcast_ref::<UpstreamDetail>();
        error!(
            status = ?detail.and_then(|d| d.status),
            "{}: {:?}", error, report
        );

        let details = match detail {
            Some(detail) => detail.message.clone(),
            None => report.current_context().to_string(),
        };
        ApiError::Upstream { error, details }
    }

    pub fn upload(err: UploadError) -> Self {
        match err {
            UploadError::Validation(message) => ApiError::BadRequest(message),
            UploadError::Upstream { message, .. } => ApiError::Upstream {
                error: "Upload Failed",
                details: message,
            },
        }
    }
}

macro_rules! bad_request_from {
    ($($rejection:ty),*) => {
        $(impl From<$rejection> for ApiError {
            fn from(rejection: $rejection) -> Self {
                ApiError::BadRequest(rejection.body_text())
            }
        })*
    };
}

bad_request_from!(JsonRejection, QueryRejection, MultipartRejection, MultipartError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Upstream { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error, "details": details })),
            )
                .into_response(),
        }
    }
}

/// Unwrap a required request field.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::missing(field))
}

/// Unwrap a required repository path. Empty counts as missing.
pub fn required_path(value: Option<String>) -> Result<String, ApiError> {
    required(value.filter(|path| !path.is_empty()), "path")
}
