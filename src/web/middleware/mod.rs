//! Middleware and extractors for the HTTP surface.

pub mod cors;
pub mod rate_limit;
pub mod security;
pub mod session;

pub use cors::create_cors_layer;
pub use rate_limit::{api_rate_limit, client_ip, enforce, ApiThrottle, ClientIp};
pub use security::security_headers;
pub use session::{require_admin_page, session_token, AdminUser, OptionalAdminUser};
