//! Web layer for Haven.
//!
//! Serves the JSON API under `/api`, the guarded admin console under
//! `/admin` and, optionally, the public site from disk.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
pub use state::{AppState, SharedState};
