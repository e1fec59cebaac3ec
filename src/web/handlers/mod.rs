//! HTTP handlers.

pub mod auth;
pub mod bootstrap;
pub mod content;
pub mod leadership;
pub mod public;
pub mod upload;

pub use auth::*;
pub use bootstrap::*;
pub use content::*;
pub use leadership::*;
pub use public::*;
pub use upload::*;
