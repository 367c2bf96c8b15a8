//! On-disk storage for uploaded books, covers and avatars
//!
//! Paths are derived from the owner id and the uploaded filename, so a user
//! re-uploading a same-named file, cover or avatar overwrites the previous
//! one. Nothing here is transactional with the database: callers remove the
//! files they wrote when the following database write fails.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

const BOOKS_DIR: &str = "uploads";
const COVERS_DIR: &str = "images";
const AVATARS_DIR: &str = "avatars";

/// Upload directories under one root
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

/// Final path component of a client-supplied filename
///
/// Browsers on some platforms send full paths; anything naming a parent or
/// root directory is reduced to its last segment.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload")
        .to_string()
}

/// Lowercased extension including the dot, or an empty string
fn dotted_extension(filename: &str) -> String {
    Path::new(&sanitize_filename(filename))
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directories if they do not exist
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [BOOKS_DIR, COVERS_DIR, AVATARS_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    /// `uploads/{user_id}_{filename}`
    pub fn book_path(&self, user_id: i64, filename: &str) -> PathBuf {
        self.root
            .join(BOOKS_DIR)
            .join(format!("{}_{}", user_id, sanitize_filename(filename)))
    }

    /// `images/cover_{user_id}{ext}`
    pub fn cover_path(&self, user_id: i64, filename: &str) -> PathBuf {
        self.root
            .join(COVERS_DIR)
            .join(format!("cover_{}{}", user_id, dotted_extension(filename)))
    }

    /// `avatars/avatar_{user_id}{ext}`
    pub fn avatar_path(&self, user_id: i64, filename: &str) -> PathBuf {
        self.root
            .join(AVATARS_DIR)
            .join(format!("avatar_{}{}", user_id, dotted_extension(filename)))
    }

    /// Write a file, creating its directory on demand
    pub async fn save(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;

        info!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    /// Delete a stored file; a file that is already gone is not an error
    pub async fn remove(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("File already removed: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
