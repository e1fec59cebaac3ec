//! Shared state for the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditLog;
use crate::auth::{Authenticator, CsrfManager, SessionManager, TokenCodec};
use crate::backend::Backends;
use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::upload::{UploadPipeline, UploadPolicy};
use crate::Result;

use super::middleware::ApiThrottle;

/// Application state shared across handlers.
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Session token issuer.
    pub sessions: SessionManager,
    /// CSRF token issuer.
    pub csrf: CsrfManager,
    /// Fixed-window limiter for login and signup.
    pub limiter: RateLimiter,
    /// Per-IP throttle for the admin API.
    pub throttle: ApiThrottle,
    /// Identity provider chain.
    pub authenticator: Authenticator,
    /// Backend collaborators.
    pub backends: Backends,
    /// Audit trail.
    pub audit: AuditLog,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("authenticator", &self.authenticator)
            .field("backends", &self.backends)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the state over explicit backends.
    pub fn new(config: Config, backends: Backends) -> Self {
        let codec = TokenCodec::new(config.auth.session_secret.as_bytes());
        let window = Duration::from_secs(config.auth.rate_window_secs.max(1));

        Self {
            sessions: SessionManager::new(codec.clone()),
            csrf: CsrfManager::new(codec, config.auth.csrf_single_use),
            limiter: RateLimiter::in_memory(window),
            throttle: ApiThrottle::new(config.web.api_rate_limit),
            authenticator: Authenticator::standard(&config.auth.demo, backends.clone()),
            audit: AuditLog::new(&backends),
            backends,
            config,
        }
    }

    /// Build the state and the backends it needs from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let backends = Backends::from_config(&config.backend)?;
        Ok(Self::new(config, backends))
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.config.web.production
    }

    /// Upload pipeline over the configured object store.
    pub fn upload_pipeline(&self) -> Result<UploadPipeline> {
        let storage = self.backends.storage()?.clone();
        Ok(UploadPipeline::new(
            storage,
            UploadPolicy::from(&self.config.upload),
            self.config.upload.concurrency,
            self.backends.timeout,
        ))
    }
}

/// State handle passed to handlers.
pub type SharedState = Arc<AppState>;
