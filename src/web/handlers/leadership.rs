//! Leadership handlers that go beyond the shared CRUD.

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::audit::action;
use crate::auth::token::now_millis;
use crate::backend::{Filter, RowQuery};
use crate::content::media::LEGACY_LEADERSHIP_BUCKET;
use crate::content::{storage_object, ContentKind};
use crate::upload::path::{profile_path, sanitize_filename};
use crate::upload::{issue_profile_upload, ProfileUploadRequest, SignedProfileUpload};
use crate::web::dto::{IdQuery, JsonBody, OkResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AdminUser;
use crate::web::state::AppState;

use super::content::required_id;

const KIND: ContentKind = ContentKind::Leadership;

/// DELETE /api/admin/leadership/delete?id= - Delete a leader and their picture.
///
/// The picture is removed after the row, and only best effort.
pub async fn delete_leader(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = required_id(&query)?;
    let store = state.backends.content()?;

    let lookup = RowQuery::new().filter(Filter::eq("id", id)).window(0, 1);
    let existing = state.backends.call(store.select(KIND.table(), &lookup)).await?;
    let image = existing
        .rows
        .first()
        .and_then(|row| row.get(KIND.media_field()))
        .and_then(Value::as_str)
        .map(str::to_string);

    state.backends.call(store.delete(KIND.table(), id)).await?;
    tracing::info!(kind = %KIND, id, user = %admin.username, "Deleted row");

    if let Some(reference) = image {
        remove_picture(&state, &reference).await;
    }
    Ok(Json(OkResponse::new()))
}

async fn remove_picture(state: &AppState, reference: &str) {
    let Ok(storage) = state.backends.storage() else {
        return;
    };
    let target = [KIND.bucket(), LEGACY_LEADERSHIP_BUCKET]
        .into_iter()
        .find_map(|bucket| storage_object(reference, bucket).map(|path| (bucket, path)));
    let Some((bucket, path)) = target else {
        return;
    };

    let paths = [path];
    if let Err(e) = state.backends.call(storage.remove(bucket, &paths)).await {
        tracing::warn!(bucket, path = %paths[0], error = %e, "Failed to remove profile picture");
    }
}

/// POST /api/admin/leadership/upload - Signed URL for a profile picture.
pub async fn init_profile_upload(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    JsonBody(req): JsonBody<ProfileUploadRequest>,
) -> Result<Json<SignedProfileUpload>, ApiError> {
    let ticket = req.validate()?;
    let issued_at = now_millis();
    let result = issue_profile_upload(&state.backends, &ticket, issued_at).await;

    let filename = sanitize_filename(&ticket.filename);
    state
        .audit
        .record(
            action::LEADERSHIP_UPLOAD_INIT,
            "leadership",
            Some(&ticket.leader_id),
            json!({
                "position": req.position,
                "folder": ticket.folder.as_str(),
                "filename": filename,
                "size": req.size,
                "type": req.content_type,
                "path": profile_path(ticket.folder, &ticket.leader_id, &ticket.filename, issued_at),
                "ok": result.is_ok(),
            }),
        )
        .await;

    let issued = result?;
    tracing::info!(path = %issued.path, user = %admin.username, "Issued profile upload URL");
    Ok(Json(issued))
}
