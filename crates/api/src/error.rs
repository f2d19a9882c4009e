use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use portal_auth::AuthError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Never says which factor was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::StorageUnavailable(e) => {
                tracing::error!("Session store unavailable: {}", e);
                ApiError::ServiceUnavailable
            }
            other => {
                tracing::error!("Admin auth failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("invalid_credentials", "Invalid credentials")),
            )
                .into_response(),
            ApiError::Forbidden(reason) => (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new(reason, "Request origin could not be verified")),
            )
                .into_response(),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(
                    "service_unavailable",
                    "Sign-in is temporarily unavailable. Please try again shortly.",
                )),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Internal server error")),
            )
                .into_response(),
        }
    }
}
