//! API error types.
//!
//! Every handler returns `Result<_, ApiError>`.  The enum implements
//! [`axum::response::IntoResponse`], rendering a `{"error": "..."}` body
//! with the variant's status code.  The client only ever sees the short
//! summary; the full cause chain of internal errors goes to the log.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// JSON error body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid video ID")]
    InvalidVideoId,

    #[error("Malformed multipart form: {0}")]
    MalformedForm(String),

    #[error("Missing file in form field `{0}`")]
    MissingFile(&'static str),

    #[error("Invalid Content-Type header")]
    InvalidContentType,

    #[error("File type not allowed: {0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Couldn't validate JWT")]
    Unauthorized(String),

    #[error("You don't own this video")]
    NotOwner,

    #[error("Couldn't find video")]
    VideoNotFound,

    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    /// Wrap a lower-level failure as a 500 with a fixed client message.
    ///
    /// Intended for `map_err(ApiError::internal("Couldn't upload file"))`.
    pub fn internal<E>(message: &'static str) -> impl FnOnce(E) -> ApiError
    where
        E: Into<anyhow::Error>,
    {
        move |source| ApiError::Internal {
            message,
            source: source.into(),
        }
    }

    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidVideoId
            | ApiError::MalformedForm(_)
            | ApiError::MissingFile(_)
            | ApiError::InvalidContentType
            | ApiError::UnsupportedMediaType(_)
            | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unauthorized(_) | ApiError::NotOwner => StatusCode::UNAUTHORIZED,
            ApiError::VideoNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::MalformedForm(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::MalformedForm(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();

        match &self {
            ApiError::Internal { message, source } => {
                error!(request_id = %request_id, error = ?source, "{message}");
            }
            ApiError::Unauthorized(reason) => {
                warn!(request_id = %request_id, status = status.as_u16(), reason = %reason, "{self}");
            }
            _ => warn!(request_id = %request_id, status = status.as_u16(), "{self}"),
        }

        (
            status,
            [("x-request-id", request_id)],
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
