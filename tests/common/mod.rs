//! Test helpers for the web API tests.
//!
//! Provides an in-memory backend standing in for the hosted services, and
//! helpers that build an [`AppState`] and an axum-test [`TestServer`] over it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use serde_json::{json, Value};

use haven::auth::{Identity, Role, CSRF_HEADER, SESSION_COOKIE};
use haven::backend::{
    AuditEntry, AuditSink, BackendUser, Backends, ContentStore, IdentityBackend, ImageTransform,
    NewBackendUser, ObjectStore, RowPage, RowQuery,
};
use haven::config::Config;
use haven::{create_router, AppState, HavenError, Result};

/// Password accepted for every account in [`MemoryBackend`].
pub const BACKEND_PASSWORD: &str = "Backend@1234";

/// Demo credentials from the default configuration.
pub const DEMO_USERNAME: &str = "admin_demo";
pub const DEMO_PASSWORD: &str = "DemoAdmin@1234";

/// An object written to [`MemoryBackend`] storage.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

/// In-memory stand-in for every hosted backend collaborator.
#[derive(Default)]
pub struct MemoryBackend {
    users: Mutex<Vec<BackendUser>>,
    tables: Mutex<HashMap<String, Vec<Value>>>,
    objects: Mutex<Vec<StoredObject>>,
    removed: Mutex<Vec<(String, String)>>,
    audit: Mutex<Vec<AuditEntry>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Number of identity calls (sign-in and create).
    pub identity_calls: AtomicUsize,
    /// Fail every `create_user` call with this backend message.
    pub create_user_error: Mutex<Option<String>>,
    /// Delay applied to each object upload.
    pub upload_delay: Mutex<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an account that signs in with [`BACKEND_PASSWORD`].
    pub fn add_user(&self, id: &str, email: &str, role: &str, username: Option<&str>) {
        let mut user_metadata = json!({});
        if let Some(name) = username {
            user_metadata["username"] = json!(name);
        }
        self.users.lock().unwrap().push(BackendUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            app_metadata: json!({ "role": role }),
            user_metadata,
        });
    }

    pub fn users(&self) -> Vec<BackendUser> {
        self.users.lock().unwrap().clone()
    }

    /// Put a row straight into a table.
    pub fn seed(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<(String, String)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap().clone()
    }

    /// Audit actions in the order they were written.
    pub fn audit_actions(&self) -> Vec<String> {
        self.audit_entries().into_iter().map(|e| e.action).collect()
    }

    /// Highest number of uploads observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// All collaborators backed by this store.
    pub fn backends(self: &Arc<Self>) -> Backends {
        Backends {
            identity: Some(self.clone() as Arc<dyn IdentityBackend>),
            admin_identity: Some(self.clone() as Arc<dyn IdentityBackend>),
            content: Some(self.clone() as Arc<dyn ContentStore>),
            storage: Some(self.clone() as Arc<dyn ObjectStore>),
            audit: Some(self.clone() as Arc<dyn AuditSink>),
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl IdentityBackend for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<BackendUser> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|u| u.email.as_deref() == Some(email) && password == BACKEND_PASSWORD)
            .cloned()
            .ok_or_else(|| HavenError::Auth("Invalid login credentials".to_string()))
    }

    async fn create_user(&self, user: &NewBackendUser) -> Result<BackendUser> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.create_user_error.lock().unwrap().clone() {
            return Err(HavenError::Backend(message));
        }
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email.as_deref() == Some(user.email.as_str())) {
            return Err(HavenError::Backend(
                "A user with this email address has already been registered".to_string(),
            ));
        }
        let created = BackendUser {
            id: format!("user-{}", users.len() + 1),
            email: Some(user.email.clone()),
            app_metadata: user.app_metadata.clone(),
            user_metadata: user.user_metadata.clone(),
        };
        users.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ContentStore for MemoryBackend {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<RowPage> {
        Ok(query.apply(self.rows(table)))
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        row["id"] = json!(id.to_string());
        self.seed(table, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r["id"] == id))
            .ok_or_else(|| HavenError::NotFound(format!("{table} row")))?;
        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(table) {
            rows.retain(|r| r["id"] != id);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.upload_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.objects.lock().unwrap().push(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str, transform: Option<ImageTransform>) -> String {
        match transform {
            Some(t) => format!(
                "https://storage.test/render/{bucket}/{path}?width={}",
                t.width.unwrap_or_default()
            ),
            None => format!("https://storage.test/object/{bucket}/{path}"),
        }
    }

    async fn create_signed_upload_url(&self, bucket: &str, path: &str) -> Result<String> {
        Ok(format!("https://storage.test/upload/sign/{bucket}/{path}?token=t"))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let mut removed = self.removed.lock().unwrap();
        for path in paths {
            removed.push((bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryBackend {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Configuration used by every test server.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.session_secret = "test-secret-key-for-testing-only".to_string();
    config.auth.bootstrap_allowlist = vec!["founder@example.org".to_string()];
    config.web.api_rate_limit = 1000;
    config
}

/// State over a fresh [`MemoryBackend`].
pub fn create_test_state() -> (Arc<AppState>, Arc<MemoryBackend>) {
    create_test_state_with(test_config())
}

pub fn create_test_state_with(config: Config) -> (Arc<AppState>, Arc<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let state = Arc::new(AppState::new(config, backend.backends()));
    (state, backend)
}

/// Test server over a fresh [`MemoryBackend`].
pub fn create_test_server() -> (TestServer, Arc<AppState>, Arc<MemoryBackend>) {
    let (state, backend) = create_test_state();
    let server = server_for(state.clone());
    (server, state, backend)
}

pub fn server_for(state: Arc<AppState>) -> TestServer {
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

/// A signed admin session token.
pub fn admin_token(state: &AppState) -> String {
    session_token(state, Role::Admin)
}

pub fn session_token(state: &AppState, role: Role) -> String {
    let identity = Identity {
        id: "user-1".to_string(),
        username: "tester".to_string(),
        email: "tester@example.org".to_string(),
        role,
    };
    state
        .sessions
        .create_session(&identity, false)
        .expect("Failed to create session")
        .token
}

/// Cookie carrying an admin session.
pub fn admin_cookie(state: &AppState) -> cookie::Cookie<'static> {
    cookie::Cookie::new(SESSION_COOKIE, admin_token(state))
}

/// A fresh CSRF token.
pub fn csrf_token(state: &AppState) -> String {
    state.csrf.issue().expect("Failed to issue CSRF token")
}

/// `(name, value)` for the CSRF header.
pub fn csrf_header(state: &AppState) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(CSRF_HEADER),
        HeaderValue::from_str(&csrf_token(state)).expect("token is header-safe"),
    )
}

/// `(name, value)` for an `X-Forwarded-For` header.
pub fn forwarded_for(ip: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_str(ip).expect("ip is header-safe"),
    )
}
