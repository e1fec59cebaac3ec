//! Haven - auth, sessions and media uploads for a nonprofit site.
//!
//! The admin console signs in through HMAC-signed session cookies, edits
//! stories, events and leadership records held by a hosted backend, and
//! pushes images to its object storage.

pub mod audit;
pub mod auth;
pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod upload;
pub mod web;

pub use audit::AuditLog;
pub use auth::{
    validate_signup, Authenticator, CsrfManager, SessionClaims, SessionManager, TokenCodec,
    ValidationError,
};
pub use backend::Backends;
pub use config::Config;
pub use error::{HavenError, Result};
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use upload::{UploadPipeline, UploadReport};
pub use web::{create_router, AppState, WebServer};
