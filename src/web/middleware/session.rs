//! Session checks for admin pages and the admin API.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use std::sync::Arc;

use crate::auth::{SessionClaims, SESSION_COOKIE};
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Session token from the `admin_session` cookie, else a bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Login URL that returns to `path` afterwards.
pub fn login_redirect_target(login_path: &str, path: &str) -> String {
    format!("{login_path}?next={}", urlencoding::encode(path))
}

/// Route guard for the admin console pages.
///
/// Only the cookie counts here; a missing cookie is checked as an empty
/// token. Anything but a valid admin session is sent to the login page.
pub async fn require_admin_page(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();

    if state.sessions.verify_admin(&token).is_some() {
        return next.run(req).await;
    }

    let path = req.uri().path();
    tracing::debug!(path, "Redirecting unauthenticated admin page request");
    Redirect::temporary(&login_redirect_target(&state.config.auth.login_path, path)).into_response()
}

/// Extractor for requests carrying a valid admin session.
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionClaims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).unwrap_or_default();
        state
            .sessions
            .verify_admin(&token)
            .map(AdminUser)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

/// Like [`AdminUser`] but lets the handler decide what to do without one.
#[derive(Debug, Clone)]
pub struct OptionalAdminUser(pub Option<SessionClaims>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalAdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = session_token(&parts.headers).and_then(|t| state.sessions.verify_admin(&t));
        Ok(OptionalAdminUser(claims))
    }
}
