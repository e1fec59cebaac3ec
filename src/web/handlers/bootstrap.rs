//! First-admin bootstrap.

use axum::{body::Bytes, extract::State, Json};
use serde_json::json;
use std::sync::Arc;

use crate::auth::Role;
use crate::backend::NewBackendUser;
use crate::web::dto::{parse_json, BootstrapRequest, BootstrapResponse, BootstrapUser};
use crate::web::error::ApiError;
use crate::web::state::AppState;
use crate::HavenError;

/// POST /api/admin/bootstrap-user - Create an admin for an allow-listed email.
///
/// Works without a session so the very first admin can be created.
pub async fn bootstrap_user(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BootstrapResponse>, ApiError> {
    let identity = state
        .backends
        .admin_identity()
        .map_err(|_| ApiError::internal("Server not configured"))?;

    let req: BootstrapRequest = parse_json(&body)?;
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password required"));
    };

    if !state.config.auth.allows_bootstrap(&email) {
        tracing::warn!(email = %email, "Bootstrap refused for email outside the allow-list");
        return Err(ApiError::forbidden("Not allowed"));
    }

    let role = json!({ "role": Role::Admin.as_str() });
    let user = NewBackendUser {
        email,
        password,
        email_confirm: true,
        user_metadata: role.clone(),
        app_metadata: role,
    };

    match state.backends.call(identity.create_user(&user)).await {
        Ok(created) => {
            tracing::info!(email = %user.email, "Bootstrapped admin account");
            Ok(Json(BootstrapResponse {
                ok: true,
                user: BootstrapUser {
                    id: created.id,
                    email: created.email,
                },
            }))
        }
        Err(e) if e.is_unavailable() => Err(e.into()),
        Err(HavenError::Backend(message)) | Err(HavenError::Auth(message)) => {
            Err(ApiError::bad_request(message))
        }
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}
