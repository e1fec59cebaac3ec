//! Public read-only endpoints behind the site pages.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::{Filter, RowQuery};
use crate::content::media::{is_current_leader, position_rank};
use crate::content::{public_row, ContentKind};
use crate::web::dto::ListResponse;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use crate::Result;

const PUBLISHED: &str = "published";

async fn fetch(state: &AppState, kind: ContentKind, query: RowQuery) -> Result<Vec<Value>> {
    let store = state.backends.content()?;
    let page = state.backends.call(store.select(kind.table(), &query)).await?;
    Ok(page.rows)
}

/// Attach the public media URL when storage is configured.
fn with_media_url(state: &AppState, kind: ContentKind, row: Value) -> Value {
    match state.backends.storage() {
        Ok(storage) => public_row(storage.as_ref(), kind, row),
        Err(_) => row,
    }
}

fn with_media_urls(state: &AppState, kind: ContentKind, rows: Vec<Value>) -> Vec<Value> {
    rows.into_iter()
        .map(|row| with_media_url(state, kind, row))
        .collect()
}

fn list(items: Vec<Value>) -> Json<ListResponse> {
    Json(ListResponse {
        total_count: items.len() as u64,
        items,
    })
}

/// GET /api/stories - Published stories, newest first.
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ListResponse>, ApiError> {
    let kind = ContentKind::Stories;
    let query = kind.base_query().filter(Filter::eq("status", PUBLISHED));
    let rows = fetch(&state, kind, query).await?;
    Ok(list(with_media_urls(&state, kind, rows)))
}

/// GET /api/stories/:id - One published story.
pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<Value>, ApiError> {
    let kind = ContentKind::Stories;
    let query = RowQuery::new()
        .filter(Filter::eq("id", id.as_str()))
        .filter(Filter::eq("status", PUBLISHED))
        .window(0, 1);
    let row = fetch(&state, kind, query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Story not found"))?;

    Ok(Json(with_media_url(&state, kind, row)))
}

/// GET /api/events - Events by date.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ListResponse>, ApiError> {
    let kind = ContentKind::Events;
    let rows = fetch(&state, kind, kind.base_query()).await?;
    Ok(list(with_media_urls(&state, kind, rows)))
}

/// GET /api/leadership - Serving leaders in display order.
pub async fn list_leadership(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ListResponse>, ApiError> {
    let kind = ContentKind::Leadership;
    let today = chrono::Local::now().date_naive();

    let mut rows: Vec<Value> = fetch(&state, kind, kind.base_query())
        .await?
        .into_iter()
        .filter(|row| is_current_leader(row, today))
        .collect();
    rows.sort_by_key(|row| {
        position_rank(row.get("position").and_then(Value::as_str).unwrap_or_default())
    });

    Ok(list(with_media_urls(&state, kind, rows)))
}
