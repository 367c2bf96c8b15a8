//! Integration tests for the infrastructure components
//!
//! These tests verify that the SQLite schema enforces the constraints the
//! services rely on.

use common::database::{health_check, init_memory_pool};
use sqlx::Row;

async fn seed_user(pool: &sqlx::SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'x') RETURNING id")
        .bind(name)
        .bind(format!("{}@example.com", name))
        .fetch_one(pool)
        .await
        .expect("Failed to insert user")
        .get("id")
}

async fn seed_book(pool: &sqlx::SqlitePool, owner: i64) -> i64 {
    sqlx::query(
        "INSERT INTO books (title, author, filename, file_path, file_size, user_id)
         VALUES ('Title', 'Author', 'a.txt', 'static/uploads/a.txt', 1, ?) RETURNING id",
    )
    .bind(owner)
    .fetch_one(pool)
    .await
    .expect("Failed to insert book")
    .get("id")
}

#[tokio::test]
async fn test_schema_is_usable() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_memory_pool().await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "SQLite simple query test failed");

    Ok(())
}

#[tokio::test]
async fn test_unique_username_and_email() {
    let pool = init_memory_pool().await.unwrap();
    seed_user(&pool, "alice").await;

    let duplicate = sqlx::query(
        "INSERT INTO users (username, email, password_hash) VALUES ('alice', 'other@example.com', 'x')",
    )
    .execute(&pool)
    .await;
    assert!(duplicate.is_err());

    let duplicate_email = sqlx::query(
        "INSERT INTO users (username, email, password_hash) VALUES ('bob', 'alice@example.com', 'x')",
    )
    .execute(&pool)
    .await;
    assert!(duplicate_email.is_err());
}

#[tokio::test]
async fn test_rating_check_and_uniqueness() {
    let pool = init_memory_pool().await.unwrap();
    let user = seed_user(&pool, "alice").await;
    let book = seed_book(&pool, user).await;

    let out_of_range = sqlx::query("INSERT INTO ratings (user_id, book_id, rating) VALUES (?, ?, 6)")
        .bind(user)
        .bind(book)
        .execute(&pool)
        .await;
    assert!(out_of_range.is_err());

    sqlx::query("INSERT INTO ratings (user_id, book_id, rating) VALUES (?, ?, 3)")
        .bind(user)
        .bind(book)
        .execute(&pool)
        .await
        .unwrap();

    let second = sqlx::query("INSERT INTO ratings (user_id, book_id, rating) VALUES (?, ?, 4)")
        .bind(user)
        .bind(book)
        .execute(&pool)
        .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn test_deleting_owner_cascades() {
    let pool = init_memory_pool().await.unwrap();
    let user = seed_user(&pool, "alice").await;
    let book = seed_book(&pool, user).await;

    sqlx::query("INSERT INTO ratings (user_id, book_id, rating) VALUES (?, ?, 5)")
        .bind(user)
        .bind(book)
        .execute(&pool)
        .await
        .unwrap();

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();

    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&pool)
        .await
        .unwrap();
    let ratings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(books, 0);
    assert_eq!(ratings, 0);
}
