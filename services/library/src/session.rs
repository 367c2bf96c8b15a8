//! Cookie-bound user sessions
//!
//! A session binds an opaque random token to a user id. The token travels in
//! the `session_id` cookie; the record lives in a [`SessionStore`]. The
//! default store keeps everything in process memory, so all sessions are lost
//! on restart. [`RedisSessionStore`] shares sessions between instances.

use std::collections::HashMap;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use common::cache::RedisPool;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

/// Lifetime of the session cookie
pub const SESSION_TTL_DAYS: i64 = 90;

const TOKEN_BYTES: usize = 16;

/// Server-side session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Hex-encoded random token, also the cookie value
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a fresh 128-bit token
    pub fn new(user_id: i64) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let mut id = String::with_capacity(TOKEN_BYTES * 2);
        for byte in bytes {
            let _ = write!(id, "{:02x}", byte);
        }

        Self {
            id,
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// Session lookup and revocation errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session cookie, or the token is unknown
    #[error("No session found")]
    NoAuth,

    /// The backing store failed
    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Storage for sessions, shared by every request handler
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue and store a new session for a user
    async fn create(&self, user_id: i64) -> Result<Session, SessionError>;

    /// Look up a session by token
    async fn find(&self, token: &str) -> Result<Option<Session>, SessionError>;

    /// Forget a session token
    async fn remove(&self, token: &str) -> Result<(), SessionError>;

    /// Resolve the session named by the request's `session_id` cookie
    ///
    /// A missing cookie and an unknown token both yield [`SessionError::NoAuth`].
    async fn check(&self, jar: &CookieJar) -> Result<Session, SessionError> {
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(SessionError::NoAuth)?;

        self.find(&token).await?.ok_or(SessionError::NoAuth)
    }

    /// Revoke the session attached to the current request
    async fn destroy(&self, current: Option<&Session>) -> Result<(), SessionError> {
        let session = current.ok_or(SessionError::NoAuth)?;
        info!("Destroying session for user: {}", session.user_id);
        self.remove(&session.id).await
    }
}

/// Cookie handing the session token to the browser
pub fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .expires(time::OffsetDateTime::now_utc() + time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// Already-expired cookie that clears the session token client-side
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .build()
}

/// Process-local session store
///
/// Reads take the shared lock and may run concurrently; `create` and `remove`
/// take the exclusive lock. Sessions are never mutated once stored.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: i64) -> Result<Session, SessionError> {
        let session = Session::new(user_id);
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());

        info!("Created session for user: {}", user_id);
        Ok(session)
    }

    async fn find(&self, token: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

/// Session store shared between instances through Redis
///
/// Records are stored as JSON under `session:{token}` and expire together
/// with the cookie.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(token: &str) -> String {
        format!("session:{}", token)
    }

    fn ttl_seconds() -> u64 {
        (SESSION_TTL_DAYS * 24 * 60 * 60) as u64
    }
}

fn backend_error(e: impl std::fmt::Display) -> SessionError {
    error!("Session backend failure: {}", e);
    SessionError::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, user_id: i64) -> Result<Session, SessionError> {
        let session = Session::new(user_id);
        let payload = serde_json::to_string(&session).map_err(backend_error)?;

        self.redis_pool
            .set(&Self::key(&session.id), &payload, Some(Self::ttl_seconds()))
            .await
            .map_err(backend_error)?;

        info!("Created session for user: {}", user_id);
        Ok(session)
    }

    async fn find(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let payload = self
            .redis_pool
            .get(&Self::key(token))
            .await
            .map_err(backend_error)?;

        payload
            .map(|payload| serde_json::from_str(&payload).map_err(backend_error))
            .transpose()
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.redis_pool
            .delete(&Self::key(token))
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
