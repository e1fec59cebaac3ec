//! Authentication handlers.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::action;
use crate::auth::{
    validate_signup, LoginOutcome, SignupOutcome, SignupRequest, CSRF_COOKIE, CSRF_HEADER,
    CSRF_TTL, SESSION_COOKIE,
};
use crate::web::dto::{
    parse_json, CsrfResponse, LoginRequest, OkResponse, SessionResponse, SignupForm,
};
use crate::web::error::ApiError;
use crate::web::middleware::{enforce, AdminUser, ClientIp};
use crate::web::state::AppState;

/// HttpOnly, SameSite=Lax cookie on `/` that lives for `ttl`.
pub fn auth_cookie(
    name: &'static str,
    value: String,
    ttl: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(cookie::time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

/// CSRF token from the header, falling back to the cookie.
fn csrf_token<'a>(headers: &'a HeaderMap, jar: &'a CookieJar) -> Option<&'a str> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or_else(|| jar.get(CSRF_COOKIE).map(|c| c.value()))
}

fn require_csrf(state: &AppState, headers: &HeaderMap, jar: &CookieJar) -> Result<(), ApiError> {
    if state.csrf.verify(csrf_token(headers, jar)) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid CSRF token"))
    }
}

/// GET|POST /api/auth/csrf - Issue a CSRF token.
pub async fn issue_csrf(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CsrfResponse>), ApiError> {
    let token = state.csrf.issue()?;
    let cookie = auth_cookie(CSRF_COOKIE, token.clone(), CSRF_TTL, state.secure_cookies());
    Ok((jar.add(cookie), Json(CsrfResponse { token })))
}

/// POST /api/auth/login - Admin login.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<OkResponse>), ApiError> {
    enforce(&state, "login", &ip, state.config.auth.login_rate_limit)?;
    require_csrf(&state, &headers, &jar)?;

    let req: LoginRequest = parse_json(&body)?;
    let identifier = req.normalized_identifier();

    let (provider, outcome) = state.authenticator.login(&identifier, &req.password).await?;
    let identity = match outcome {
        LoginOutcome::Verified(identity) => identity,
        LoginOutcome::Unauthorized => {
            tracing::warn!(ip = %ip, provider, "Login by non-admin account");
            return Err(ApiError::forbidden("Unauthorized"));
        }
        LoginOutcome::InvalidCredentials | LoginOutcome::NotHandled => {
            tracing::info!(ip = %ip, provider, "Login failed");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    let session = state.sessions.create_session(&identity, req.remember)?;
    let cookie = auth_cookie(SESSION_COOKIE, session.token, session.ttl, state.secure_cookies());

    if provider == "demo" {
        state
            .audit
            .record(action::LOGIN_DEMO, "auth", None, json!({ "ip": ip }))
            .await;
    } else {
        state
            .audit
            .record(
                action::LOGIN_SUCCESS,
                "auth",
                None,
                json!({ "ip": ip, "email": identifier }),
            )
            .await;
    }
    tracing::info!(user = %identity.username, provider, remember = req.remember, "Admin logged in");

    Ok((jar.add(cookie), Json(OkResponse::new())))
}

/// POST /api/auth/signup - Provision an admin account.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<Json<OkResponse>, ApiError> {
    enforce(&state, "signup", &ip, state.config.auth.signup_rate_limit)?;
    require_csrf(&state, &headers, &jar)?;

    let form: SignupForm = parse_json(&body)?;
    let request = SignupRequest {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_lowercase(),
        password: form.password,
    };
    validate_signup(&request.username, &request.email, &request.password, &form.confirm)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.authenticator.signup(&request).await {
        Ok((_, SignupOutcome::Simulated)) => {
            state
                .audit
                .record(action::SIGNUP_DEMO, "auth", None, json!({ "ip": ip }))
                .await;
            Ok(Json(OkResponse::new()))
        }
        Ok((_, SignupOutcome::Created { id })) => {
            state
                .audit
                .record(
                    action::SIGNUP_SUCCESS,
                    "auth",
                    Some(&id),
                    json!({ "ip": ip, "email": request.email }),
                )
                .await;
            tracing::info!(email = %request.email, "Admin account created");
            Ok(Json(OkResponse::new()))
        }
        Ok((_, SignupOutcome::NotHandled)) => Err(ApiError::service_unavailable()),
        Err(e) if e.is_unavailable() => Err(e.into()),
        Err(e) => {
            tracing::warn!(email = %request.email, error = %e, "Signup failed");
            state
                .audit
                .record(
                    action::SIGNUP_FAILED,
                    "auth",
                    None,
                    json!({ "ip": ip, "email": request.email }),
                )
                .await;
            Err(ApiError::internal("Sign-up failed"))
        }
    }
}

/// POST /api/auth/logout - Clear the session cookie.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<OkResponse>) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(OkResponse::new()),
    )
}

/// GET /api/auth/session - Current admin.
pub async fn current_session(AdminUser(claims): AdminUser) -> Json<SessionResponse> {
    Json(SessionResponse::from(&claims))
}
