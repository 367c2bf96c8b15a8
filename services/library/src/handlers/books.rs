//! Catalog, reading, rating and book management

use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{MultipartForm, file_response, signed_in_user};
use crate::error::{AppError, AppResult};
use crate::formats::{BookContent, is_editable, is_text_file, read_content};
use crate::middleware::{CurrentSession, MaybeSession};
use crate::models::{Book, BookUpdate, NewBook, SortOrder, normalize_tags};
use crate::session::Session;
use crate::state::AppState;
use crate::validation::validate_book_metadata;
use crate::views::{
    BookDetailView, EditBookView, IndexView, ReadBookView, UploadView, View,
};

/// Home page with the latest uploads
pub async fn index(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Response {
    let books = state
        .book_repository
        .latest(state.config.latest_limit)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to load latest books: {}", e);
            Vec::new()
        });

    IndexView {
        user: signed_in_user(&state, session.as_ref()).await,
        books,
        query: String::new(),
        tags: Vec::new(),
        sort: SortOrder::default(),
        popular_tags: Vec::new(),
        is_search: false,
    }
    .render()
    .into_response()
}

/// `/search` query string
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    /// Comma-separated tags
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub sort: String,
}

/// Search page; without a query or tags it lists the whole catalog
pub async fn search(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.trim().to_string();
    let tags: Vec<String> = params
        .tags
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    let sort = SortOrder::parse(&params.sort);

    let books = state
        .book_repository
        .search(&query, &tags, sort)
        .await
        .unwrap_or_else(|e| {
            error!("Search failed: {}", e);
            Vec::new()
        });

    let popular_tags = state
        .book_repository
        .popular_tags(state.config.popular_tags_limit)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to load popular tags: {}", e);
            Vec::new()
        });

    IndexView {
        user: signed_in_user(&state, session.as_ref()).await,
        books,
        query,
        tags,
        sort,
        popular_tags,
        is_search: true,
    }
    .render()
    .into_response()
}

pub async fn book_detail(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = state.book_repository.find_by_id(id).await?;

    let user_rating = match &session {
        Some(session) => state
            .book_repository
            .user_rating(session.user_id, id)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load rating of user {}: {}", session.user_id, e);
                0
            }),
        None => 0,
    };

    let view = BookDetailView {
        user: signed_in_user(&state, session.as_ref()).await,
        book,
        user_rating,
    };
    Ok(view.render().into_response())
}

/// Reading page; text formats are shown inline
pub async fn read_book(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = state.book_repository.find_by_id(id).await?;

    let content = if is_text_file(&book.filename) {
        match read_content(&book.file_path).await {
            Ok(content) => Some(content),
            Err(e) => {
                error!("Failed to read book file {}: {}", book.file_path, e);
                Some(BookContent::Text(
                    "The content of this book could not be loaded.".to_string(),
                ))
            }
        }
    } else {
        None
    };

    let can_edit = session
        .as_ref()
        .is_some_and(|session| book.is_owned_by(session.user_id))
        && is_editable(&book.filename);

    let view = ReadBookView {
        user: signed_in_user(&state, session.as_ref()).await,
        book,
        content,
        can_edit,
    };
    Ok(view.render().into_response())
}

/// Original file as an attachment
pub async fn download_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = state.book_repository.find_by_id(id).await?;
    file_response(&book.file_path, Some(&book.filename)).await
}

pub async fn book_cover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = state.book_repository.find_by_id(id).await?;
    let cover = book.cover_image.ok_or(AppError::NotFound("Cover"))?;
    file_response(&cover, None).await
}

#[derive(Debug, Deserialize)]
pub struct RateForm {
    #[serde(default)]
    pub rating: String,
}

/// Rate a book from 1 to 5; anonymous callers get 401
pub async fn rate_book(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<i64>,
    Form(form): Form<RateForm>,
) -> AppResult<Response> {
    let session = session.ok_or(AppError::Unauthorized)?;

    let rating: i64 = form
        .rating
        .trim()
        .parse()
        .ok()
        .filter(|rating| (1..=5).contains(rating))
        .ok_or_else(|| AppError::BadRequest("Invalid rating".to_string()))?;

    state.book_repository.find_by_id(id).await?;
    state
        .book_repository
        .rate(session.user_id, id, rating)
        .await?;

    Ok(Redirect::to(&format!("/books/{}", id)).into_response())
}

pub async fn upload_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Response {
    UploadView {
        user: signed_in_user(&state, Some(&session)).await,
        error: None,
    }
    .render()
    .into_response()
}

/// Store an uploaded book and its optional cover
///
/// Files are written first; when the database insert fails they are removed
/// again.
pub async fn upload_book(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let user_id = session.user_id;

    let title = form.text("title").trim().to_string();
    let author = form.text("author").trim().to_string();

    if let Err(message) = validate_book_metadata(&title, &author) {
        return Ok(upload_rejected(&state, &session, message).await);
    }

    let Some(book_file) = form.take_file("book_file") else {
        return Ok(upload_rejected(&state, &session, "A book file is required".to_string()).await);
    };

    let cover_path = match form.take_file("cover_image") {
        Some(cover) if !cover.data.is_empty() => {
            let path = state.uploads.cover_path(user_id, &cover.filename);
            match state.uploads.save(&path, &cover.data).await {
                Ok(()) => Some(path),
                Err(e) => {
                    error!("Failed to save cover image: {}", e);
                    None
                }
            }
        }
        _ => None,
    };

    let book_path = state.uploads.book_path(user_id, &book_file.filename);
    if let Err(e) = state.uploads.save(&book_path, &book_file.data).await {
        if let Some(cover_path) = &cover_path {
            remove_quietly(&state, cover_path).await;
        }
        return Err(AppError::internal("Failed to save book file", e));
    }

    let new_book = NewBook {
        title,
        author,
        description: form.text("description").trim().to_string(),
        filename: crate::uploads::sanitize_filename(&book_file.filename),
        file_path: book_path.to_string_lossy().into_owned(),
        file_size: book_file.data.len() as i64,
        cover_image: cover_path
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned()),
        tags: normalize_tags(form.text("tags")),
        user_id,
    };

    match state.book_repository.create(&new_book).await {
        Ok(id) => {
            info!("User {} uploaded book {}", user_id, id);
            Ok(Redirect::to("/profile").into_response())
        }
        Err(e) => {
            remove_quietly(&state, &book_path).await;
            if let Some(cover_path) = &cover_path {
                remove_quietly(&state, cover_path).await;
            }
            Err(e.into())
        }
    }
}

async fn upload_rejected(state: &AppState, session: &Session, message: String) -> Response {
    let view = UploadView {
        user: signed_in_user(state, Some(session)).await,
        error: Some(message),
    };
    (StatusCode::BAD_REQUEST, view.render()).into_response()
}

async fn remove_quietly(state: &AppState, path: &std::path::Path) {
    if let Err(e) = state.uploads.remove(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Load a book and make sure the caller owns it
async fn owned_book(state: &AppState, id: i64, user_id: i64) -> AppResult<Book> {
    let book = state.book_repository.find_by_id(id).await?;
    if !book.is_owned_by(user_id) {
        warn!("User {} tried to modify book {}", user_id, id);
        return Err(AppError::Forbidden);
    }
    Ok(book)
}

/// Delete a book row, then its files
pub async fn delete_book(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = owned_book(&state, id, session.user_id).await?;

    state.book_repository.delete(id, session.user_id).await?;

    remove_quietly(&state, std::path::Path::new(&book.file_path)).await;
    if let Some(cover) = &book.cover_image {
        remove_quietly(&state, std::path::Path::new(cover)).await;
    }

    Ok(Redirect::to("/profile").into_response())
}

pub async fn edit_book_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let book = owned_book(&state, id, session.user_id).await?;

    let content = if is_editable(&book.filename) {
        match tokio::fs::read(&book.file_path).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                error!("Failed to read book file {}: {}", book.file_path, e);
                Some(String::new())
            }
        }
    } else {
        None
    };

    let view = EditBookView {
        user: signed_in_user(&state, Some(&session)).await,
        book,
        content,
    };
    Ok(view.render().into_response())
}

#[derive(Debug, Deserialize)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: String,
    /// New file content; left empty to keep the stored file
    #[serde(default)]
    pub content: String,
}

/// Save metadata edits and, for text formats, new content
pub async fn update_book(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
    Form(form): Form<BookForm>,
) -> AppResult<Response> {
    let book = owned_book(&state, id, session.user_id).await?;

    let title = form.title.trim().to_string();
    let author = form.author.trim().to_string();
    validate_book_metadata(&title, &author).map_err(AppError::BadRequest)?;

    let mut file_size = None;
    if is_text_file(&book.filename) && !form.content.is_empty() {
        tokio::fs::write(&book.file_path, form.content.as_bytes())
            .await
            .map_err(|e| AppError::internal("Failed to update book content", e))?;
        file_size = Some(form.content.len() as i64);
    }

    let update = BookUpdate {
        title,
        author,
        description: form.description.trim().to_string(),
        tags: normalize_tags(&form.tags),
        file_size,
    };
    state
        .book_repository
        .update(id, session.user_id, &update)
        .await?;

    Ok(Redirect::to(&format!("/books/{}", id)).into_response())
}
