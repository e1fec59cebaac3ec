//! Admin sessions carried entirely in a signed cookie.
//!
//! There is no server-side session table: a session is valid while its
//! signature checks out and its expiry has not passed.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::token::{now_millis, TokenClaims, TokenCodec, TokenKind};
use crate::Result;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "admin_session";

/// Lifetime of a session created with "remember me".
pub const REMEMBER_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Lifetime of a regular session.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 8);

/// Account role. Only `Admin` opens the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Site administrator.
    Admin,
    /// Anything else.
    #[serde(other)]
    Member,
}

impl Role {
    /// Map a free-form role claim to a role.
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim {
            Some("admin") => Role::Admin,
            _ => Role::Member,
        }
    }

    /// Role name as stored in tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Role::from_claim(Some(s)))
    }
}

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Subject identifier from the identity backend.
    pub id: String,
    /// Display username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Role.
    pub role: Role,
}

impl Identity {
    /// Whether this identity may use the admin console.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Claims stored in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject identifier.
    pub sub: String,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Expiry, epoch milliseconds.
    pub exp: i64,
}

impl TokenClaims for SessionClaims {
    const KIND: TokenKind = TokenKind::Session;
}

impl SessionClaims {
    /// Whether the session grants admin access.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The identity this session was issued for.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// A freshly issued session token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Signed token for the cookie.
    pub token: String,
    /// How long the token stays valid.
    pub ttl: Duration,
}

/// Issues and checks session tokens.
#[derive(Debug, Clone)]
pub struct SessionManager {
    codec: TokenCodec,
}

impl SessionManager {
    /// Create a session manager on top of a token codec.
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    /// Session lifetime for the "remember me" choice.
    pub fn ttl(remember: bool) -> Duration {
        if remember {
            REMEMBER_TTL
        } else {
            DEFAULT_TTL
        }
    }

    /// Issue a session token for `identity`.
    pub fn create_session(&self, identity: &Identity, remember: bool) -> Result<IssuedSession> {
        let ttl = Self::ttl(remember);
        let claims = SessionClaims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            role: identity.role,
            exp: now_millis() + ttl.as_millis() as i64,
        };
        let token = self.codec.sign(&claims)?;
        Ok(IssuedSession { token, ttl })
    }

    /// Verify a session token. An empty token is never valid.
    pub fn verify_session(&self, token: &str) -> Option<SessionClaims> {
        if token.is_empty() {
            return None;
        }
        self.codec.verify(token)
    }

    /// Verify a session token and require the admin role.
    pub fn verify_admin(&self, token: &str) -> Option<SessionClaims> {
        self.verify_session(token).filter(SessionClaims::is_admin)
    }
}
