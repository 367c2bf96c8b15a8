//! User repository for database operations

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{RepositoryError, RepositoryResult};
use crate::models::{NewUser, User, UserProfile};
use crate::password::{PasswordError, PasswordHasher};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { pool, hasher }
    }

    /// Hashing runs on the blocking pool
    async fn hash_password(&self, password: &str) -> RepositoryResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(PasswordError::from_join)??;

        Ok(hash)
    }

    async fn verify_password(&self, password: &str, stored_hash: &str) -> RepositoryResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(PasswordError::from_join)??;

        Ok(valid)
    }

    /// Create a new user and return its id
    pub async fn create(&self, new_user: &NewUser) -> RepositoryResult<i64> {
        info!("Creating new user: {}", new_user.username);

        let password_hash = self.hash_password(&new_user.password).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Find a user by username, including the password hash
    pub async fn find_by_username(&self, username: &str) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, avatar, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::UserNotFound)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> RepositoryResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, username, email, avatar, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::UserNotFound)
    }

    /// Check a username/password pair
    ///
    /// Returns [`RepositoryError::UserNotFound`] for an unknown username and
    /// [`RepositoryError::BadPassword`] for a wrong password.
    pub async fn authorize(&self, username: &str, password: &str) -> RepositoryResult<User> {
        let user = self.find_by_username(username).await?;

        if !self.verify_password(password, &user.password_hash).await? {
            warn!("Rejected password for user: {}", username);
            return Err(RepositoryError::BadPassword);
        }

        Ok(user)
    }

    /// Verify the current password of a signed-in user
    pub async fn check_password(&self, user_id: i64, password: &str) -> RepositoryResult<bool> {
        let stored_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(RepositoryError::UserNotFound)?;

        self.verify_password(password, &stored_hash).await
    }

    pub async fn update_username(&self, user_id: i64, username: &str) -> RepositoryResult<()> {
        info!("Updating username for user: {}", user_id);
        self.update_column("UPDATE users SET username = ? WHERE id = ?", user_id, username)
            .await
    }

    pub async fn update_email(&self, user_id: i64, email: &str) -> RepositoryResult<()> {
        info!("Updating email for user: {}", user_id);
        self.update_column("UPDATE users SET email = ? WHERE id = ?", user_id, email)
            .await
    }

    /// Replace the password; the new value is hashed before storage
    pub async fn update_password(&self, user_id: i64, password: &str) -> RepositoryResult<()> {
        info!("Updating password for user: {}", user_id);
        let password_hash = self.hash_password(password).await?;
        self.update_column(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            user_id,
            &password_hash,
        )
        .await
    }

    pub async fn update_avatar(&self, user_id: i64, avatar_path: &str) -> RepositoryResult<()> {
        info!("Updating avatar for user: {}", user_id);
        self.update_column("UPDATE users SET avatar = ? WHERE id = ?", user_id, avatar_path)
            .await
    }

    async fn update_column(&self, sql: &str, user_id: i64, value: &str) -> RepositoryResult<()> {
        let result = sqlx::query(sql)
            .bind(value)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound);
        }

        Ok(())
    }
}
