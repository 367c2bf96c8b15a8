//! Bookshelf routes

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::handlers::{auth, books, health_check, profile};
use crate::middleware::{access_log, attach_session, catch_panic, require_session};
use crate::state::AppState;

/// Largest accepted request body, uploads included
pub const MAX_BODY_BYTES: usize = 32 << 20;

/// Create the router for the web service
///
/// Layers, outermost first: access log, panic guard, session lookup. Routes
/// that need a signed-in user additionally redirect anonymous callers to
/// `/login`.
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/upload", get(books::upload_page).post(books::upload_book))
        .route("/profile", get(profile::profile))
        .route("/edit-profile", get(profile::edit_profile_page))
        .route("/update-profile", post(profile::update_profile))
        .route("/books/:id/delete", post(books::delete_book))
        .route("/books/:id/edit", get(books::edit_book_page))
        .route("/books/:id/update", post(books::update_book))
        .route("/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/", get(books::index))
        .route("/health", get(health_check))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/search", get(books::search))
        .route("/books/:id", get(books::book_detail))
        .route("/books/:id/read", get(books::read_book))
        .route("/books/:id/download", get(books::download_book))
        .route("/books/:id/cover", get(books::book_cover))
        .route("/books/:id/rate", post(books::rate_book))
        .route("/users/:id/avatar", get(profile::user_avatar))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), attach_session))
        .layer(middleware::from_fn(catch_panic))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}
