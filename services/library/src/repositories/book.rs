//! Book and rating repository for database operations

use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, warn};

use super::{RepositoryError, RepositoryResult};
use crate::models::{Book, BookUpdate, NewBook, SortOrder, split_tags};

const BOOK_SELECT: &str = r#"
    SELECT b.id AS id, b.title AS title, b.author AS author, b.description AS description,
           b.filename AS filename, b.file_path AS file_path, b.file_size AS file_size,
           b.cover_image AS cover_image, b.tags AS tags, b.rating AS rating,
           b.rating_count AS rating_count, b.user_id AS user_id, u.username AS username,
           b.created_at AS created_at
    FROM books b
    JOIN users u ON b.user_id = u.id
"#;

/// Book repository
#[derive(Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

/// `%term%` LIKE pattern with the term's own wildcards escaped by `\`
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl BookRepository {
    /// Create a new book repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a book and return its id
    ///
    /// Files referenced by `file_path` and `cover_image` must already be
    /// written; removing them when this fails is up to the caller.
    pub async fn create(&self, book: &NewBook) -> RepositoryResult<i64> {
        info!("Creating book '{}' for user: {}", book.title, book.user_id);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, author, description, filename, file_path, file_size,
                               cover_image, tags, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.filename)
        .bind(&book.file_path)
        .bind(book.file_size)
        .bind(&book.cover_image)
        .bind(&book.tags)
        .bind(book.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Get a book by ID
    pub async fn find_by_id(&self, id: i64) -> RepositoryResult<Book> {
        let sql = format!("{BOOK_SELECT} WHERE b.id = ?");

        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::BookNotFound)
    }

    /// Most recently uploaded books
    pub async fn latest(&self, limit: i64) -> RepositoryResult<Vec<Book>> {
        let sql = format!("{BOOK_SELECT} ORDER BY b.created_at DESC, b.id DESC LIMIT ?");

        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Books uploaded by one user, newest first
    pub async fn by_owner(&self, user_id: i64) -> RepositoryResult<Vec<Book>> {
        let sql = format!("{BOOK_SELECT} WHERE b.user_id = ? ORDER BY b.created_at DESC, b.id DESC");

        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Search the catalog
    ///
    /// A non-empty `query` matches a substring of the title, author,
    /// description or tag string. Each requested tag matches as a substring of
    /// the tag string and the tags are OR-ed together, so "art" also finds
    /// "cart". Both filters combine with AND.
    pub async fn search(
        &self,
        query: &str,
        tags: &[String],
        sort: SortOrder,
    ) -> RepositoryResult<Vec<Book>> {
        let query = query.trim();
        let tags: Vec<&str> = tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect();

        let mut builder = QueryBuilder::<Sqlite>::new(BOOK_SELECT);
        let mut has_filter = false;

        if !query.is_empty() {
            let pattern = like_pattern(query);
            builder.push(" WHERE (");
            for (i, column) in ["b.title", "b.author", "b.description", "b.tags"]
                .iter()
                .enumerate()
            {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push(*column)
                    .push(" LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            builder.push(")");
            has_filter = true;
        }

        if !tags.is_empty() {
            builder.push(if has_filter { " AND (" } else { " WHERE (" });
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push("b.tags LIKE ")
                    .push_bind(like_pattern(tag))
                    .push(" ESCAPE '\\'");
            }
            builder.push(")");
        }

        builder.push(" ORDER BY ").push(sort.order_by());

        let books = builder
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Distinct tags seen across the catalog, newest books first
    ///
    /// Tags are not ranked by frequency.
    pub async fn popular_tags(&self, limit: usize) -> RepositoryResult<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT tags FROM books WHERE tags != '' ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut seen = HashSet::new();
        let mut tags = Vec::new();

        'books: for row in &rows {
            for tag in split_tags(row) {
                if tags.len() >= limit {
                    break 'books;
                }
                if seen.insert(tag) {
                    tags.push(tag.to_string());
                }
            }
        }

        Ok(tags)
    }

    /// Update the metadata of a book owned by `user_id`
    pub async fn update(
        &self,
        book_id: i64,
        user_id: i64,
        update: &BookUpdate,
    ) -> RepositoryResult<()> {
        info!("Updating book {} for user: {}", book_id, user_id);

        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, description = ?, tags = ?,
                file_size = COALESCE(?, file_size)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.description)
        .bind(&update.tags)
        .bind(update.file_size)
        .bind(book_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::BookNotFoundOrNotOwned);
        }

        Ok(())
    }

    /// Delete a book owned by `user_id`
    ///
    /// Deleting another user's book, or a missing one, affects no rows and
    /// reports [`RepositoryError::BookNotFoundOrNotOwned`].
    pub async fn delete(&self, book_id: i64, user_id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ? AND user_id = ?")
            .bind(book_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("Book {} not deleted for user {}", book_id, user_id);
            return Err(RepositoryError::BookNotFoundOrNotOwned);
        }

        info!("Deleted book {} for user: {}", book_id, user_id);
        Ok(())
    }

    /// Record a user's rating and refresh the book's aggregate
    ///
    /// The rating upsert and the recomputation of `rating`/`rating_count`
    /// commit together or not at all.
    pub async fn rate(&self, user_id: i64, book_id: i64, rating: i64) -> RepositoryResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(RepositoryError::InvalidRating(rating));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO ratings (user_id, book_id, rating)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, book_id) DO UPDATE SET rating = excluded.rating
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(rating)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE books
            SET rating = COALESCE((SELECT AVG(rating) FROM ratings WHERE book_id = ?), 0),
                rating_count = (SELECT COUNT(*) FROM ratings WHERE book_id = ?)
            WHERE id = ?
            "#,
        )
        .bind(book_id)
        .bind(book_id)
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::BookNotFound);
        }

        tx.commit().await?;

        info!("User {} rated book {} with {}", user_id, book_id, rating);
        Ok(())
    }

    /// A user's rating of a book, 0 when the user has not rated it
    pub async fn user_rating(&self, user_id: i64, book_id: i64) -> RepositoryResult<i64> {
        let rating: Option<i64> =
            sqlx::query_scalar("SELECT rating FROM ratings WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(rating.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("foo"), "%foo%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
    }
}
