//! Server configuration
//!
//! Values come from built-in defaults overridden by `BOOKSHELF_*`
//! environment variables, e.g. `BOOKSHELF_BIND_ADDRESS=127.0.0.1:9000`.

use std::path::PathBuf;

use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Where sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// Shared Redis instance, see `REDIS_URL`
    Redis,
}

/// Configuration of the web service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_address: String,
    /// Root directory for uploaded books, covers and avatars
    pub upload_dir: PathBuf,
    pub session_backend: SessionBackend,
    /// Number of books shown on the home page
    pub latest_limit: i64,
    /// Number of tags offered on the search page
    pub popular_tags_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            upload_dir: PathBuf::from("static"),
            session_backend: SessionBackend::Memory,
            latest_limit: 12,
            popular_tags_limit: 20,
        }
    }
}

impl ServerConfig {
    /// Load the configuration from the environment
    ///
    /// # Environment Variables
    /// - `BOOKSHELF_BIND_ADDRESS` (default: "0.0.0.0:8080")
    /// - `BOOKSHELF_UPLOAD_DIR` (default: "static")
    /// - `BOOKSHELF_SESSION_BACKEND`: "memory" or "redis" (default: "memory")
    /// - `BOOKSHELF_LATEST_LIMIT` (default: 12)
    /// - `BOOKSHELF_POPULAR_TAGS_LIMIT` (default: 20)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config: Self = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("upload_dir", defaults.upload_dir.to_string_lossy().into_owned())?
            .set_default("session_backend", "memory")?
            .set_default("latest_limit", defaults.latest_limit)?
            .set_default("popular_tags_limit", defaults.popular_tags_limit as i64)?
            .add_source(Environment::with_prefix("BOOKSHELF").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.latest_limit <= 0 {
            return Err(ConfigError::Message(
                "BOOKSHELF_LATEST_LIMIT must be greater than 0".to_string(),
            ));
        }

        Ok(config)
    }
}
