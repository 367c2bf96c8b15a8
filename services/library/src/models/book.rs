//! Book model, search ordering and tag helpers

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Book entity joined with its owner's username
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Filename as uploaded by the owner
    pub filename: String,
    /// Location of the stored file
    pub file_path: String,
    pub file_size: i64,
    pub cover_image: Option<String>,
    /// Comma-separated tags
    pub tags: String,
    /// Mean of all ratings, 0 when unrated
    pub rating: f64,
    pub rating_count: i64,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags)
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// New book creation payload
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub cover_image: Option<String>,
    pub tags: String,
    pub user_id: i64,
}

/// Metadata edit applied by the owner
#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
    pub title: String,
    pub author: String,
    pub description: String,
    pub tags: String,
    /// New size when the file content was rewritten
    pub file_size: Option<i64>,
}

/// Result ordering for catalog search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Highest rating first, newest breaks ties
    Rating,
    #[default]
    Newest,
    /// Most ratings first, then highest rating
    Popular,
}

impl SortOrder {
    /// Parse a `sort` query value; anything unrecognised means newest-first
    pub fn parse(value: &str) -> Self {
        match value {
            "rating" => SortOrder::Rating,
            "popular" => SortOrder::Popular,
            _ => SortOrder::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Rating => "rating",
            SortOrder::Newest => "newest",
            SortOrder::Popular => "popular",
        }
    }

    /// SQL `ORDER BY` clause over the `books b` alias
    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            SortOrder::Rating => "b.rating DESC, b.created_at DESC, b.id DESC",
            SortOrder::Newest => "b.created_at DESC, b.id DESC",
            SortOrder::Popular => "b.rating_count DESC, b.rating DESC, b.id DESC",
        }
    }
}

/// Split a comma-separated tag string into trimmed, non-empty tags
pub fn split_tags(tags: &str) -> Vec<&str> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Canonical storage form of a tag list: trimmed tags joined by commas
pub fn normalize_tags(tags: &str) -> String {
    split_tags(tags).join(",")
}
