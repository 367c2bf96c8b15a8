//! Custom error types for the web service

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::repositories::RepositoryError;
use crate::session::SessionError;

/// Errors a handler can answer with
///
/// Responses carry a short generic message; details are only logged.
#[derive(Error, Debug)]
pub enum AppError {
    /// No session, or bad credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Signed in, but not the owner
    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AppError {
    /// Log an unexpected failure and hide it behind a 500
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        AppError::InternalServerError
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid form data: {}", e.body_text()))
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NoAuth => AppError::Unauthorized,
            SessionError::Backend(_) => AppError::internal("Session store failure", e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            AppError::Repository(e) => match e {
                RepositoryError::UserNotFound => {
                    (StatusCode::NOT_FOUND, "User not found".to_string())
                }
                RepositoryError::BookNotFound | RepositoryError::BookNotFoundOrNotOwned => {
                    (StatusCode::NOT_FOUND, "Book not found".to_string())
                }
                RepositoryError::BadPassword => {
                    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
                }
                RepositoryError::InvalidRating(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                RepositoryError::PasswordHash(_) | RepositoryError::Database(_) => {
                    error!("Repository failure: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        (status, message).into_response()
    }
}

/// Type alias for handler results
pub type AppResult<T> = Result<T, AppError>;
