//! Application state shared across handlers

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::ServerConfig;
use crate::password::PasswordHasher;
use crate::repositories::{BookRepository, UserRepository};
use crate::session::SessionStore;
use crate::uploads::UploadStorage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub user_repository: UserRepository,
    pub book_repository: BookRepository,
    pub sessions: Arc<dyn SessionStore>,
    pub uploads: UploadStorage,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        db_pool: SqlitePool,
        hasher: Arc<dyn PasswordHasher>,
        sessions: Arc<dyn SessionStore>,
        config: ServerConfig,
    ) -> Self {
        Self {
            user_repository: UserRepository::new(db_pool.clone(), hasher),
            book_repository: BookRepository::new(db_pool.clone()),
            uploads: UploadStorage::new(config.upload_dir.clone()),
            config: Arc::new(config),
            sessions,
            db_pool,
        }
    }
}
