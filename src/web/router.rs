//! Router configuration.

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::Html,
    routing::{delete, get, patch, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::content::{EventInput, LeaderInput, StoryInput};

use super::handlers::{
    bootstrap_user, create_row, current_session, delete_leader, delete_row, get_story,
    init_profile_upload, issue_csrf, list_events, list_leadership, list_rows, list_stories, login,
    logout, signup, update_row, upload_images,
};
use super::middleware::{api_rate_limit, create_cors_layer, require_admin_page, security_headers};
use super::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/csrf", get(issue_csrf).post(issue_csrf))
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", post(logout))
        .route("/session", get(current_session));

    let stories = Router::new()
        .route("/list", get(list_rows::<StoryInput>))
        .route("/create", post(create_row::<StoryInput>))
        .route("/update", patch(update_row::<StoryInput>))
        .route("/delete", delete(delete_row::<StoryInput>));

    let events = Router::new()
        .route("/list", get(list_rows::<EventInput>))
        .route("/create", post(create_row::<EventInput>))
        .route("/update", patch(update_row::<EventInput>))
        .route("/delete", delete(delete_row::<EventInput>));

    let leadership = Router::new()
        .route("/list", get(list_rows::<LeaderInput>))
        .route("/create", post(create_row::<LeaderInput>))
        .route("/update", patch(update_row::<LeaderInput>))
        .route("/delete", delete(delete_leader))
        .route("/upload", post(init_profile_upload));

    let admin_routes = Router::new()
        .route(
            "/images/upload",
            post(upload_images)
                .layer(DefaultBodyLimit::max(state.config.upload.max_request_bytes)),
        )
        .route("/bootstrap-user", post(bootstrap_user))
        .nest("/content/stories", stories)
        .nest("/content/events", events)
        .nest("/leadership", leadership)
        .route_layer(middleware::from_fn_with_state(state.clone(), api_rate_limit));

    let public_routes = Router::new()
        .route("/stories", get(list_stories))
        .route("/stories/:id", get(get_story))
        .route("/events", get(list_events))
        .route("/leadership", get(list_leadership));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .merge(public_routes);

    Router::new()
        .nest("/api", api_routes)
        .merge(create_admin_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&state.config.web.cors_origins))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(state)
}

/// Admin console pages behind the route guard.
///
/// With static serving enabled the console is read from
/// `{static_path}/admin`; otherwise a minimal shell page is returned.
pub fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let guard = middleware::from_fn_with_state(state.clone(), require_admin_page);
    let web = &state.config.web;

    let pages = if web.serve_static {
        let dir = Path::new(&web.static_path).join("admin");
        let index = dir.join("index.html");
        Router::new().nest_service(
            "/admin",
            ServeDir::new(dir).fallback(ServeFile::new(index)),
        )
    } else {
        Router::new()
            .route("/admin", get(admin_shell))
            .route("/admin/*rest", get(admin_shell))
    };

    pages.layer(guard)
}

async fn admin_shell(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Admin</title></head>\
         <body><div id=\"admin\" data-login=\"{}\"></div></body></html>",
        state.config.auth.login_path
    ))
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Public site served from `static_path`.
pub fn create_static_router(static_path: &str) -> Option<Router> {
    let path = Path::new(static_path);
    if !path.is_dir() {
        tracing::warn!(path = %static_path, "Static directory not found; public site not served");
        return None;
    }
    Some(Router::new().fallback_service(
        ServeDir::new(path).fallback(ServeFile::new(path.join("index.html"))),
    ))
}
