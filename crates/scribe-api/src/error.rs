use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use scribe_types::api::ErrorBody;

/// Error taxonomy for the whole REST surface. Every variant maps to one
/// status code and one client-visible message; there is no retry or
/// recovery anywhere, a failed request is terminal.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Username already taken")]
    DuplicateUsername,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    InvalidCurrentPassword,
    #[error("Missing or invalid bearer token")]
    Unauthorized,
    #[error("You are not the author of this {0}")]
    NotOwner(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid file type. Accepted formats: JPG, JPEG, PNG, GIF, WEBP")]
    InvalidFileType,
    #[error("File too large. Maximum size is 5MB.")]
    FileTooLarge,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateEmail
            | ApiError::DuplicateUsername
            | ApiError::InvalidFileType
            | ApiError::FileTooLarge => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::InvalidCurrentPassword
            | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotOwner(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail goes to the log, never to the client.
        let message = if let ApiError::Internal(ref e) = self {
            error!("internal error: {:#}", e);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                status_code: status.as_u16(),
                message,
            }),
        )
            .into_response()
    }
}
