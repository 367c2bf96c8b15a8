//! Request handlers
//!
//! Handlers receive the caller's session through the [`CurrentSession`] and
//! [`MaybeSession`] extractors and answer with a rendered view, a redirect or
//! an [`AppError`].
//!
//! [`CurrentSession`]: crate::middleware::CurrentSession
//! [`MaybeSession`]: crate::middleware::MaybeSession

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::models::UserProfile;
use crate::repositories::RepositoryError;
use crate::session::Session;
use crate::state::AppState;

pub mod auth;
pub mod books;
pub mod profile;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or_else(|e| {
            error!("Database health check failed: {}", e);
            false
        });

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "bookshelf",
        "database": database,
    }))
}

/// Profile of the signed-in user for the navigation bar
///
/// A failed lookup only costs the navigation bar, so it is logged and the
/// page renders as anonymous.
pub(crate) async fn signed_in_user(
    state: &AppState,
    session: Option<&Session>,
) -> Option<UserProfile> {
    let session = session?;
    match state.user_repository.find_by_id(session.user_id).await {
        Ok(user) => Some(user),
        Err(e) => {
            error!("Failed to load user {}: {}", session.user_id, e);
            None
        }
    }
}

/// Whether a repository error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(e: &RepositoryError) -> bool {
    match e {
        RepositoryError::Database(e) => e
            .as_database_error()
            .is_some_and(|db_error| db_error.is_unique_violation()),
        _ => false,
    }
}

/// A file part of a multipart form
pub(crate) struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// A parsed multipart form
///
/// File inputs left empty by the browser (no filename) are dropped.
#[derive(Default)]
pub(crate) struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await?;
                    if !filename.is_empty() {
                        form.files.insert(name, UploadedFile { filename, data });
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Text value of a field, empty when absent
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Respond with a stored file
///
/// With `download_name` set the browser is asked to save the file under
/// that name.
pub(crate) async fn file_response(
    path: impl AsRef<Path>,
    download_name: Option<&str>,
) -> AppResult<Response> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            error!("Stored file missing: {}", path.display());
            AppError::NotFound("File")
        } else {
            AppError::internal("Failed to read stored file", e)
        }
    })?;

    let response = match download_name {
        Some(name) => {
            let name = name.replace(['"', '\\', '\r', '\n'], "_");
            (
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", name),
                    ),
                ],
                data,
            )
                .into_response()
        }
        None => ([(header::CONTENT_TYPE, content_type_for(path))], data).into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("cover_1.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("avatar_1.png")), "image/png");
        assert_eq!(content_type_for(Path::new("avatar_1")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_file_response_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = file_response(dir.path().join("gone.txt"), None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_response_sets_attachment_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_book.txt");
        tokio::fs::write(&path, "hello").await.unwrap();

        let response = file_response(&path, Some("my \"book\".txt")).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"my _book_.txt\""
        );
    }
}
