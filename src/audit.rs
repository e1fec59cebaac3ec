//! Best-effort audit trail.
//!
//! Writes go to the backend's `admin_logs` table. A missing sink, a backend
//! error or a timeout is logged at debug level and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::backend::{with_deadline, AuditEntry, AuditSink, Backends};

/// Audit action names.
pub mod action {
    /// Demo account logged in.
    pub const LOGIN_DEMO: &str = "auth_login_demo";
    /// Backend account logged in.
    pub const LOGIN_SUCCESS: &str = "auth_login_success";
    /// Demo signup acknowledged.
    pub const SIGNUP_DEMO: &str = "auth_signup_demo";
    /// Backend signup failed.
    pub const SIGNUP_FAILED: &str = "auth_signup_failed";
    /// Backend signup succeeded.
    pub const SIGNUP_SUCCESS: &str = "auth_signup_success";
    /// Upload without a valid admin session.
    pub const UNAUTHORIZED_UPLOAD: &str = "unauthorized_upload_attempt";
    /// Signed profile upload issued.
    pub const LEADERSHIP_UPLOAD_INIT: &str = "leadership_upload_init";
}

/// Handle for writing audit entries.
#[derive(Clone)]
pub struct AuditLog {
    sink: Option<Arc<dyn AuditSink>>,
    timeout: Duration,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl AuditLog {
    /// Audit log over the configured backends.
    pub fn new(backends: &Backends) -> Self {
        Self {
            sink: backends.audit.clone(),
            timeout: backends.timeout,
        }
    }

    /// Whether entries go anywhere.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Write one entry. Never fails.
    pub async fn record(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        metadata: Value,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        let entry = AuditEntry {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            metadata,
        };
        if let Err(e) = with_deadline(self.timeout, sink.record(&entry)).await {
            tracing::debug!(action, error = %e, "Audit write failed");
        }
    }
}
