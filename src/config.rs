//! Configuration module for Haven.

use serde::Deserialize;
use std::path::Path;

use crate::{HavenError, Result};

/// Web server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Production mode (marks cookies `Secure`).
    #[serde(default)]
    pub production: bool,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve the admin console and public site from disk.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// Rate limit for admin API endpoints (requests per minute).
    #[serde(default = "default_api_rate_limit")]
    pub api_rate_limit: u32,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    3000
}

fn default_static_path() -> String {
    "public".to_string()
}

fn default_api_rate_limit() -> u32 {
    300
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            production: false,
            cors_origins: vec![],
            serve_static: false,
            static_path: default_static_path(),
            api_rate_limit: default_api_rate_limit(),
        }
    }
}

/// Demo account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Whether the demo account is available.
    #[serde(default = "default_demo_enabled")]
    pub enabled: bool,
    /// Demo username.
    #[serde(default = "default_demo_username")]
    pub username: String,
    /// Demo email.
    #[serde(default = "default_demo_email")]
    pub email: String,
    /// Demo password.
    #[serde(default = "default_demo_password")]
    pub password: String,
}

fn default_demo_enabled() -> bool {
    true
}

fn default_demo_username() -> String {
    "admin_demo".to_string()
}

fn default_demo_email() -> String {
    "admin@demo.com".to_string()
}

fn default_demo_password() -> String {
    "DemoAdmin@1234".to_string()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: default_demo_enabled(),
            username: default_demo_username(),
            email: default_demo_email(),
            password: default_demo_password(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session and CSRF tokens.
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    /// Where the route guard sends unauthenticated visitors.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Login attempts allowed per window and client IP.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Signup attempts allowed per window and client IP.
    #[serde(default = "default_signup_rate_limit")]
    pub signup_rate_limit: u32,
    /// Rate limit window in seconds.
    #[serde(default = "default_rate_window")]
    pub rate_window_secs: u64,
    /// Reject a CSRF token after its first successful use.
    #[serde(default)]
    pub csrf_single_use: bool,
    /// Emails allowed to use the bootstrap endpoint in addition to
    /// [`FOUNDER_ADMIN_EMAIL`].
    #[serde(default)]
    pub bootstrap_allowlist: Vec<String>,
    /// Demo account.
    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_session_secret() -> String {
    "dev-secret".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_login_rate_limit() -> u32 {
    10
}

fn default_signup_rate_limit() -> u32 {
    5
}

fn default_rate_window() -> u64 {
    60
}

/// Address that may always bootstrap the first admin account.
pub const FOUNDER_ADMIN_EMAIL: &str = "ogillovicky70@gmail.com";

impl AuthConfig {
    /// Whether `email` may create an admin through the bootstrap endpoint.
    pub fn allows_bootstrap(&self, email: &str) -> bool {
        email == FOUNDER_ADMIN_EMAIL || self.bootstrap_allowlist.iter().any(|e| e == email)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: default_session_secret(),
            login_path: default_login_path(),
            login_rate_limit: default_login_rate_limit(),
            signup_rate_limit: default_signup_rate_limit(),
            rate_window_secs: default_rate_window(),
            csrf_single_use: false,
            bootstrap_allowlist: Vec::new(),
            demo: DemoConfig::default(),
        }
    }
}

/// Hosted backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (empty disables it).
    #[serde(default)]
    pub url: String,
    /// Public (anonymous) API key, used for password sign-in.
    #[serde(default)]
    pub anon_key: String,
    /// Service role key, used for administrative calls.
    #[serde(default)]
    pub service_key: String,
    /// Deadline for every backend call in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_key: String::new(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl BackendConfig {
    /// Whether a backend URL is configured.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Upload pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum size of a single file in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum size of a whole multipart request in bytes.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Number of uploads in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Accepted MIME types for gallery uploads.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Bucket used when the form does not name one.
    #[serde(default = "default_bucket")]
    pub default_bucket: String,
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_max_request_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_concurrency() -> usize {
    4
}

fn default_allowed_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/gif", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_bucket() -> String {
    "gallery".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_request_bytes: default_max_request_bytes(),
            concurrency: default_concurrency(),
            allowed_types: default_allowed_types(),
            default_bucket: default_bucket(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/haven.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Web server configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Hosted backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HavenError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| HavenError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `HAVEN_SESSION_SECRET`: token signing secret
    /// - `HAVEN_BACKEND_URL`, `HAVEN_BACKEND_ANON_KEY`, `HAVEN_BACKEND_SERVICE_KEY`
    /// - `HAVEN_ADMIN_WHITELIST`: extra bootstrap emails, comma separated
    /// - `HAVEN_PRODUCTION`: `1` or `true` enables production mode
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty("HAVEN_SESSION_SECRET") {
            self.auth.session_secret = secret;
        }
        if let Some(url) = non_empty("HAVEN_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(key) = non_empty("HAVEN_BACKEND_ANON_KEY") {
            self.backend.anon_key = key;
        }
        if let Some(key) = non_empty("HAVEN_BACKEND_SERVICE_KEY") {
            self.backend.service_key = key;
        }
        if let Some(list) = non_empty("HAVEN_ADMIN_WHITELIST") {
            for email in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.auth.bootstrap_allowlist.iter().any(|e| e == email) {
                    self.auth.bootstrap_allowlist.push(email.to_string());
                }
            }
        }
        if let Some(flag) = non_empty("HAVEN_PRODUCTION") {
            self.web.production = matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - production mode runs with an empty or development session secret
    /// - upload concurrency is zero
    pub fn validate(&self) -> Result<()> {
        if self.web.production
            && (self.auth.session_secret.is_empty()
                || self.auth.session_secret == default_session_secret())
        {
            return Err(HavenError::Config(
                "production mode requires auth.session_secret. \
                 Set it in config.toml or via HAVEN_SESSION_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.upload.concurrency == 0 {
            return Err(HavenError::Config(
                "upload.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
