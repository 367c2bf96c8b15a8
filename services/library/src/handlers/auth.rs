//! Login, registration and logout

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, warn};

use super::is_unique_violation;
use crate::error::AppResult;
use crate::middleware::{CurrentSession, MaybeSession};
use crate::models::{LoginCredentials, NewUser};
use crate::repositories::RepositoryError;
use crate::session::{expired_session_cookie, session_cookie};
use crate::state::AppState;
use crate::validation::{validate_email, validate_password, validate_username};
use crate::views::{AuthForm, AuthFormView, View};

pub async fn login_page(MaybeSession(session): MaybeSession) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    AuthFormView::new(AuthForm::Login).render().into_response()
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<LoginCredentials>,
) -> AppResult<Response> {
    let user = match state
        .user_repository
        .authorize(&credentials.username, &credentials.password)
        .await
    {
        Ok(user) => user,
        Err(RepositoryError::UserNotFound | RepositoryError::BadPassword) => {
            warn!("Failed login for user: {}", credentials.username);
            let view = AuthFormView {
                error: Some("Invalid credentials".to_string()),
                username: credentials.username,
                ..AuthFormView::new(AuthForm::Login)
            };
            return Ok((StatusCode::UNAUTHORIZED, view.render()).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let session = state.sessions.create(user.id).await?;
    info!("User {} logged in", user.username);

    Ok((jar.add(session_cookie(&session)), Redirect::to("/")).into_response())
}

pub async fn register_page(MaybeSession(session): MaybeSession) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    AuthFormView::new(AuthForm::Register).render().into_response()
}

/// Create an account and sign the new user in
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(mut new_user): Form<NewUser>,
) -> AppResult<Response> {
    new_user.username = new_user.username.trim().to_string();
    new_user.email = new_user.email.trim().to_string();

    let rejected = |message: String, new_user: NewUser| {
        let view = AuthFormView {
            error: Some(message),
            username: new_user.username,
            email: new_user.email,
            ..AuthFormView::new(AuthForm::Register)
        };
        (StatusCode::BAD_REQUEST, view.render()).into_response()
    };

    if let Err(message) = validate_username(&new_user.username)
        .and_then(|_| validate_email(&new_user.email))
        .and_then(|_| validate_password(&new_user.password))
    {
        return Ok(rejected(message, new_user));
    }

    let user_id = match state.user_repository.create(&new_user).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Ok(rejected(
                "Username or email is already taken".to_string(),
                new_user,
            ));
        }
        Err(e) => {
            error!("Registration failed for {}: {}", new_user.username, e);
            return Err(e.into());
        }
    };

    info!("User {} registered", new_user.username);

    let session = state.sessions.create(user_id).await?;
    Ok((jar.add(session_cookie(&session)), Redirect::to("/")).into_response())
}

/// Revoke the current session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> AppResult<Response> {
    state.sessions.destroy(Some(&session)).await?;
    info!("User {} logged out", session.user_id);

    Ok((jar.add(expired_session_cookie()), Redirect::to("/")).into_response())
}
