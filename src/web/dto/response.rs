//! Response DTOs for the HTTP surface.

use serde::Serialize;
use serde_json::Value;

use crate::auth::SessionClaims;

/// `{ "ok": true }`.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    /// Always true.
    pub ok: bool,
}

impl OkResponse {
    /// The success body.
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Freshly issued CSRF token.
#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    /// Signed token.
    pub token: String,
}

/// Identity behind the current session.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    /// Subject identifier.
    pub id: String,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Role.
    pub role: &'static str,
}

/// Current session response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// The signed-in admin.
    pub user: SessionUser,
    /// Expiry in epoch milliseconds.
    pub expires_at: i64,
}

impl From<&SessionClaims> for SessionResponse {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user: SessionUser {
                id: claims.sub.clone(),
                username: claims.username.clone(),
                email: claims.email.clone(),
                role: claims.role.as_str(),
            },
            expires_at: claims.exp,
        }
    }
}

/// One page of an admin list.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Rows on this page.
    pub items: Vec<Value>,
    /// Rows matching the filters across all pages.
    pub total_count: u64,
}

/// Account created by the bootstrap endpoint.
#[derive(Debug, Serialize)]
pub struct BootstrapUser {
    /// Backend identifier.
    pub id: String,
    /// Email.
    pub email: Option<String>,
}

/// Bootstrap response.
#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    /// Always true.
    pub ok: bool,
    /// The created account.
    pub user: BootstrapUser,
}
