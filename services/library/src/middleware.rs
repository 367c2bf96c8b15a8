//! Session gate, panic guard and access log

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, warn};

use crate::session::{Session, SessionError};
use crate::state::AppState;

/// Attach the caller's session to the request, if there is one
///
/// Anonymous requests pass through untouched; this layer never rejects.
pub async fn attach_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match state.sessions.check(&jar).await {
        Ok(session) => {
            req.extensions_mut().insert(session);
        }
        Err(SessionError::NoAuth) => {}
        Err(e) => warn!("Treating request as anonymous: {}", e),
    }

    next.run(req).await
}

/// Send anonymous callers to the login page
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<Session>().is_none() {
        match state.sessions.check(&jar).await {
            Ok(session) => {
                req.extensions_mut().insert(session);
            }
            Err(_) => return Redirect::to("/login").into_response(),
        }
    }

    next.run(req).await
}

/// Turn a panicking handler into a 500 response
///
/// The rest of the stack runs in its own task so a panic unwinds only that
/// task.
pub async fn catch_panic(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match tokio::spawn(next.run(req)).await {
        Ok(response) => response,
        Err(e) => {
            error!("Handler for {} {} failed: {}", method, path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Log method, remote address, path and latency of every request
pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    info!(
        method = %method,
        remote_addr = %remote_addr,
        path = %path,
        status = response.status().as_u16(),
        latency = ?start.elapsed(),
        "request"
    );

    response
}

/// Session of a signed-in caller
///
/// Extraction fails with a redirect to the login page for anonymous callers.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(|| Redirect::to("/login"))
    }
}

/// Session of the caller, `None` when anonymous
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<Session>().cloned()))
    }
}
