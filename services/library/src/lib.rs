//! Bookshelf: a self-hosted book-sharing web service
//!
//! Users register, upload book files with metadata, browse and search the
//! catalog, rate books and read text formats in the browser.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use library::{
//!     AppState, config::ServerConfig, password::Argon2Hasher, routes::create_router,
//!     session::MemorySessionStore,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = common::database::init_memory_pool().await?;
//! let state = AppState::new(
//!     pool,
//!     Arc::new(Argon2Hasher::default()),
//!     Arc::new(MemorySessionStore::new()),
//!     ServerConfig::default(),
//! );
//! let app = create_router(state);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod formats;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod uploads;
pub mod validation;
pub mod views;

pub use state::AppState;
