//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("missing x-user-id header")]
    Unauthenticated,

    #[error("user id must not be empty")]
    InvalidUserId,

    #[error("message needs text or an image")]
    EmptyMessage,

    #[error("message text exceeds {max} characters")]
    MessageTooLong { max: usize },
}

impl ApiError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidUserId => "invalid_user_id",
            Self::EmptyMessage => "empty_message",
            Self::MessageTooLong { .. } => "message_too_long",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidUserId | Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::MessageTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

/// Serializable error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::from(&self))).into_response()
    }
}
