//! Authentication module for Haven.
//!
//! This module provides signed tokens, admin sessions, CSRF protection,
//! credential validation and the identity provider chain.

pub mod csrf;
pub mod provider;
pub mod session;
pub mod token;
pub mod validation;

pub use csrf::{CsrfManager, CSRF_COOKIE, CSRF_HEADER, CSRF_TTL};
pub use provider::{
    Authenticator, BackendProvider, DemoProvider, IdentityProvider, LoginOutcome, SignupOutcome,
    SignupRequest, DEMO_USER_ID,
};
pub use session::{
    Identity, IssuedSession, Role, SessionClaims, SessionManager, DEFAULT_TTL, REMEMBER_TTL,
    SESSION_COOKIE,
};
pub use token::{TokenClaims, TokenCodec, TokenKind};
pub use validation::{validate_signup, ValidationError};
