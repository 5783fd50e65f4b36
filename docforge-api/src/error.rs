use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Json,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docforge_core::ConversionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message describing what went wrong
    pub error: String,
}

/// Application-specific error types for the API
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation or conversion failures from docforge-core
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Malformed or oversized multipart body
    #[error("Failed to read upload: {message}")]
    Multipart { status: StatusCode, message: String },

    /// The blocking conversion task died
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conversion(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Multipart {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::warn!("Request rejected ({status}): {self}");
        }

        let error_response = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        for err in [
            ConversionError::MissingField("file".into()),
            ConversionError::EmptySelection("file".into()),
            ConversionError::UnsupportedType {
                field: "file".into(),
                filename: "x.pdf".into(),
            },
            ConversionError::Decode("not utf-8".into()),
            ConversionError::TooDeeplyNested {
                depth: 100,
                limit: 64,
            },
        ] {
            assert_eq!(AppError::from(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_pipeline_failures_are_server_errors() {
        for err in [
            ConversionError::Render("pdf".into()),
            ConversionError::Inference("model".into()),
            ConversionError::Encode("png".into()),
        ] {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(
            AppError::Internal("join".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_is_transparent() {
        let err = AppError::from(ConversionError::MissingField("file".into()));
        assert_eq!(err.to_string(), "No file provided");
    }
}
