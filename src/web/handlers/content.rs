//! Admin CRUD handlers shared by every content kind.
//!
//! Each handler is generic over the kind's input type; the router
//! instantiates them per kind, e.g. `get(list_rows::<StoryInput>)`.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::content::{ContentInput, ListParams};
use crate::web::dto::{CreateJson, IdQuery, ListResponse, OkResponse, PatchJson};
use crate::web::error::ApiError;
use crate::web::middleware::AdminUser;
use crate::web::state::AppState;

/// The `id` query parameter or a 400.
pub fn required_id(query: &IdQuery) -> Result<&str, ApiError> {
    query.id().ok_or_else(|| ApiError::bad_request("Missing id"))
}

/// GET .../list - One page of rows.
pub async fn list_rows<T: ContentInput>(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let store = state.backends.content()?;
    let query = params.to_query(T::KIND);
    let page = state
        .backends
        .call(store.select(T::KIND.table(), &query))
        .await?;

    Ok(Json(ListResponse {
        total_count: page.total.unwrap_or(page.rows.len() as u64),
        items: page.rows,
    }))
}

/// POST .../create - Insert a row.
pub async fn create_row<T>(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    CreateJson(input): CreateJson<T>,
) -> Result<Json<OkResponse>, ApiError>
where
    T: ContentInput + DeserializeOwned,
{
    let store = state.backends.content()?;
    let row = input.create_row();
    let created = state.backends.call(store.insert(T::KIND.table(), row)).await?;

    let id = created.get("id").cloned().unwrap_or_default();
    tracing::info!(
        kind = %T::KIND,
        id = %id,
        user = %admin.username,
        "Created row"
    );
    Ok(Json(OkResponse::new()))
}

/// PATCH .../update?id= - Patch the supplied fields of a row.
pub async fn update_row<T>(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Query(query): Query<IdQuery>,
    PatchJson(input): PatchJson<T>,
) -> Result<Json<OkResponse>, ApiError>
where
    T: ContentInput + DeserializeOwned,
{
    let id = required_id(&query)?;
    let patch = input.update_patch();
    if patch.as_object().is_some_and(|fields| fields.is_empty()) {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let store = state.backends.content()?;
    state
        .backends
        .call(store.update(T::KIND.table(), id, patch))
        .await?;

    tracing::info!(kind = %T::KIND, id, user = %admin.username, "Updated row");
    Ok(Json(OkResponse::new()))
}

/// DELETE .../delete?id= - Delete a row.
pub async fn delete_row<T: ContentInput>(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = required_id(&query)?;
    let store = state.backends.content()?;
    state.backends.call(store.delete(T::KIND.table(), id)).await?;

    tracing::info!(kind = %T::KIND, id, user = %admin.username, "Deleted row");
    Ok(Json(OkResponse::new()))
}
