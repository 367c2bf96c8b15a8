//! Profile page and profile edits

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info};

use super::{MultipartForm, file_response, is_unique_violation};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentSession;
use crate::models::UserProfile;
use crate::repositories::RepositoryError;
use crate::state::AppState;
use crate::validation::{validate_email, validate_password, validate_username};
use crate::views::{EditProfileView, ProfileView, View};

pub async fn profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<Response> {
    let user = state.user_repository.find_by_id(session.user_id).await?;

    let books = state
        .book_repository
        .by_owner(session.user_id)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to load books of user {}: {}", session.user_id, e);
            Vec::new()
        });

    Ok(ProfileView { user, books }.render().into_response())
}

pub async fn edit_profile_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<Response> {
    let user = state.user_repository.find_by_id(session.user_id).await?;
    Ok(EditProfileView { user, error: None }.render().into_response())
}

fn profile_rejected(user: UserProfile, message: &str) -> Response {
    let view = EditProfileView {
        user,
        error: Some(message.to_string()),
    };
    (StatusCode::BAD_REQUEST, view.render()).into_response()
}

/// Apply profile edits
///
/// Changing the username, email or password requires the current password.
/// A new avatar alone does not.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let user_id = session.user_id;
    let current = state.user_repository.find_by_id(user_id).await?;

    let username = form.text("username").trim().to_string();
    let email = form.text("email").trim().to_string();
    let new_password = form.text("new_password").to_string();

    let username_changed = !username.is_empty() && username != current.username;
    let email_changed = !email.is_empty() && email != current.email;
    let password_changed = !new_password.is_empty();

    if username_changed || email_changed || password_changed {
        let valid = state
            .user_repository
            .check_password(user_id, form.text("current_password"))
            .await?;
        if !valid {
            return Ok(profile_rejected(current, "Invalid current password"));
        }
    }

    let validation = [
        (username_changed, validate_username(&username)),
        (email_changed, validate_email(&email)),
        (password_changed, validate_password(&new_password)),
    ];
    if let Some((_, Err(message))) = validation
        .into_iter()
        .find(|(changed, result)| *changed && result.is_err())
    {
        return Ok(profile_rejected(current, &message));
    }

    let updated = async {
        if username_changed {
            state.user_repository.update_username(user_id, &username).await?;
        }
        if email_changed {
            state.user_repository.update_email(user_id, &email).await?;
        }
        if password_changed {
            state.user_repository.update_password(user_id, &new_password).await?;
        }
        Ok::<(), RepositoryError>(())
    }
    .await;

    if let Err(e) = updated {
        if is_unique_violation(&e) {
            return Ok(profile_rejected(current, "Username or email is already taken"));
        }
        return Err(AppError::Repository(e));
    }

    if let Some(avatar) = form.take_file("avatar").filter(|file| !file.data.is_empty()) {
        let path = state.uploads.avatar_path(user_id, &avatar.filename);
        state
            .uploads
            .save(&path, &avatar.data)
            .await
            .map_err(|e| AppError::internal("Failed to save avatar", e))?;

        if let Err(e) = state
            .user_repository
            .update_avatar(user_id, &path.to_string_lossy())
            .await
        {
            if let Err(remove_error) = state.uploads.remove(&path).await {
                error!("Failed to remove avatar {}: {}", path.display(), remove_error);
            }
            return Err(e.into());
        }
    }

    info!("User {} updated their profile", user_id);
    Ok(Redirect::to("/profile").into_response())
}

pub async fn user_avatar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let user = state.user_repository.find_by_id(id).await?;
    if user.avatar.is_empty() {
        return Err(AppError::NotFound("Avatar"));
    }
    file_response(&user.avatar, None).await
}
