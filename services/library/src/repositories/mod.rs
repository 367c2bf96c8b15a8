//! Repositories for database operations

use thiserror::Error;

use crate::password::PasswordError;

pub mod book;
pub mod user;

pub use book::BookRepository;
pub use user::UserRepository;

/// Errors returned by the repositories
///
/// Lookups distinguish "not found" from storage failures. Constraint
/// violations such as a duplicate username are not decomposed and surface as
/// [`RepositoryError::Database`].
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    BadPassword,

    #[error("Book not found")]
    BookNotFound,

    #[error("Book not found or not owned by user")]
    BookNotFoundOrNotOwned,

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error(transparent)]
    PasswordHash(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Type alias for repository results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
