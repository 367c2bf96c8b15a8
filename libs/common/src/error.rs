//! Errors raised while bringing up the SQLite store

use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// `DATABASE_URL` could not be parsed as a SQLite connection string
    #[error("Invalid database URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    /// The directory holding the database file could not be created
    #[error("Cannot create database directory: {0}")]
    Directory(#[source] std::io::Error),

    #[error("Cannot open database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Database query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// An embedded migration failed or the schema history diverged
    #[error("Database migration failed: {0}")]
    Migration(#[from] MigrateError),

    #[error("Invalid database settings: {0}")]
    Configuration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
