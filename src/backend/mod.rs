//! Hosted backend collaborators.
//!
//! The site keeps no state of its own. Identities, content rows, blobs and the
//! audit log live in a hosted backend reached through the traits below. Each
//! collaborator is optional: a missing one surfaces as
//! [`HavenError::ServiceUnavailable`].

pub mod query;
pub mod rest;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use query::{Filter, Order, RowPage, RowQuery};
pub use rest::RestBackend;

use crate::config::BackendConfig;
use crate::{HavenError, Result};

/// A user record as returned by the identity backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendUser {
    /// Subject identifier.
    pub id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Server-controlled metadata.
    #[serde(default)]
    pub app_metadata: Value,
    /// User-editable metadata.
    #[serde(default)]
    pub user_metadata: Value,
}

impl BackendUser {
    /// Role claim, app metadata first.
    pub fn role_claim(&self) -> Option<&str> {
        self.app_metadata
            .get("role")
            .and_then(Value::as_str)
            .or_else(|| self.user_metadata.get("role").and_then(Value::as_str))
    }

    /// Username from user metadata.
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(Value::as_str)
    }
}

/// Request to provision a new identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBackendUser {
    /// Email address.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Skip the confirmation email.
    pub email_confirm: bool,
    /// User-editable metadata.
    pub user_metadata: Value,
    /// Server-controlled metadata.
    pub app_metadata: Value,
}

/// Password sign-in and account provisioning.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Verify an email/password pair. Rejections are [`HavenError::Auth`].
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<BackendUser>;

    /// Create a confirmed account with the given metadata.
    async fn create_user(&self, user: &NewBackendUser) -> Result<BackendUser>;
}

/// Row storage for content tables.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Select rows matching `query`.
    async fn select(&self, table: &str, query: &RowQuery) -> Result<RowPage>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch the row with `id`.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<()>;

    /// Delete the row with `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// Image resize options understood by the storage service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTransform {
    /// Target width in pixels.
    pub width: Option<u32>,
    /// Target height in pixels.
    pub height: Option<u32>,
    /// JPEG/WebP quality, 1-100.
    pub quality: Option<u8>,
    /// Crop to fill the box.
    pub cover: bool,
}

impl ImageTransform {
    /// Gallery thumbnails.
    pub const THUMBNAIL: ImageTransform = ImageTransform {
        width: Some(400),
        height: Some(225),
        quality: Some(70),
        cover: false,
    };

    /// Leadership profile pictures right after upload.
    pub const PROFILE: ImageTransform = ImageTransform {
        width: Some(400),
        height: None,
        quality: Some(85),
        cover: false,
    };

    /// Square avatars on the public about page.
    pub const AVATAR: ImageTransform = ImageTransform {
        width: Some(400),
        height: Some(400),
        quality: Some(80),
        cover: true,
    };
}

/// Blob storage with public and signed URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, overwriting any existing object.
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str)
        -> Result<()>;

    /// Public URL of an object, optionally through the resize service.
    fn public_url(&self, bucket: &str, path: &str, transform: Option<ImageTransform>) -> String;

    /// A time-limited URL the client can upload `path` to directly.
    async fn create_signed_upload_url(&self, bucket: &str, path: &str) -> Result<String>;

    /// Remove objects.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// One row of the `admin_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// What happened, e.g. `auth_login_success`.
    pub action: String,
    /// Kind of entity touched.
    pub entity_type: String,
    /// Entity identifier, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Free-form details.
    pub metadata: Value,
}

/// Sink for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// The set of configured backend collaborators.
#[derive(Clone)]
pub struct Backends {
    /// Password sign-in (needs the anonymous key).
    pub identity: Option<Arc<dyn IdentityBackend>>,
    /// Account provisioning (needs the service key).
    pub admin_identity: Option<Arc<dyn IdentityBackend>>,
    /// Content rows.
    pub content: Option<Arc<dyn ContentStore>>,
    /// Blob storage.
    pub storage: Option<Arc<dyn ObjectStore>>,
    /// Audit log.
    pub audit: Option<Arc<dyn AuditSink>>,
    /// Deadline applied to every call.
    pub timeout: Duration,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("identity", &self.identity.is_some())
            .field("admin_identity", &self.admin_identity.is_some())
            .field("content", &self.content.is_some())
            .field("storage", &self.storage.is_some())
            .field("audit", &self.audit.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Backends {
    /// No backend at all (demo-only operation).
    pub fn none(timeout: Duration) -> Self {
        Self {
            identity: None,
            admin_identity: None,
            content: None,
            storage: None,
            audit: None,
            timeout,
        }
    }

    /// Build collaborators from configuration.
    ///
    /// Sign-in needs the URL and the anonymous key; everything else needs the
    /// service key. Public content reads fall back to the anonymous key.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        if !config.is_configured() {
            tracing::warn!("No backend configured; only the demo account is available");
            return Ok(Self::none(timeout));
        }

        let rest = Arc::new(RestBackend::new(
            &config.url,
            &config.anon_key,
            &config.service_key,
            timeout,
        )?);
        let has_anon = !config.anon_key.is_empty();
        let has_service = !config.service_key.is_empty();

        Ok(Self {
            identity: has_anon.then(|| rest.clone() as Arc<dyn IdentityBackend>),
            admin_identity: has_service.then(|| rest.clone() as Arc<dyn IdentityBackend>),
            content: (has_anon || has_service).then(|| rest.clone() as Arc<dyn ContentStore>),
            storage: has_service.then(|| rest.clone() as Arc<dyn ObjectStore>),
            audit: has_service.then(|| rest.clone() as Arc<dyn AuditSink>),
            timeout,
        })
    }

    /// Run one backend call under the configured deadline.
    pub async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.timeout, fut).await
    }

    /// The sign-in backend or a service-unavailable error.
    pub fn identity(&self) -> Result<&Arc<dyn IdentityBackend>> {
        self.identity
            .as_ref()
            .ok_or_else(|| HavenError::ServiceUnavailable("identity backend".into()))
    }

    /// The provisioning backend or a service-unavailable error.
    pub fn admin_identity(&self) -> Result<&Arc<dyn IdentityBackend>> {
        self.admin_identity
            .as_ref()
            .ok_or_else(|| HavenError::ServiceUnavailable("identity admin backend".into()))
    }

    /// The content store or a service-unavailable error.
    pub fn content(&self) -> Result<&Arc<dyn ContentStore>> {
        self.content
            .as_ref()
            .ok_or_else(|| HavenError::ServiceUnavailable("content store".into()))
    }

    /// The object store or a service-unavailable error.
    pub fn storage(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.storage
            .as_ref()
            .ok_or_else(|| HavenError::ServiceUnavailable("object storage".into()))
    }
}

/// Await `fut`, failing with [`HavenError::BackendTimeout`] after `limit`.
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?limit, "Backend call timed out");
            Err(HavenError::BackendTimeout(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_claim_prefers_app_metadata() {
        let user = BackendUser {
            id: "u1".into(),
            email: Some("a@b.co".into()),
            app_metadata: json!({"role": "admin"}),
            user_metadata: json!({"role": "member", "username": "alice_admin"}),
        };
        assert_eq!(user.role_claim(), Some("admin"));
        assert_eq!(user.username(), Some("alice_admin"));
    }

    #[test]
    fn test_role_claim_falls_back_to_user_metadata() {
        let user = BackendUser {
            id: "u1".into(),
            user_metadata: json!({"role": "admin"}),
            ..Default::default()
        };
        assert_eq!(user.role_claim(), Some("admin"));
        assert_eq!(BackendUser::default().role_claim(), None);
    }

    #[test]
    fn test_unconfigured_backends() {
        let backends = Backends::from_config(&BackendConfig::default()).unwrap();
        assert!(matches!(
            backends.identity(),
            Err(HavenError::ServiceUnavailable(_))
        ));
        assert!(backends.content().is_err());
        assert!(backends.storage().is_err());
        assert!(backends.audit.is_none());
    }

    #[test]
    fn test_anon_key_only_enables_sign_in_and_reads() {
        let config = BackendConfig {
            url: "https://project.example.co".into(),
            anon_key: "anon".into(),
            service_key: String::new(),
            timeout_secs: 5,
        };
        let backends = Backends::from_config(&config).unwrap();
        assert!(backends.identity().is_ok());
        assert!(backends.content().is_ok());
        assert!(backends.admin_identity().is_err());
        assert!(backends.storage().is_err());
        assert_eq!(backends.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(HavenError::BackendTimeout(_))));
    }

    #[tokio::test]
    async fn test_with_deadline_passes_result_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<()> = with_deadline(Duration::from_secs(1), async {
            Err(HavenError::Backend("boom".into()))
        })
        .await;
        assert!(matches!(err, Err(HavenError::Backend(_))));
    }
}
