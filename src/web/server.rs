//! Web server for Haven.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::error::{HavenError, Result};

use super::router::{create_health_router, create_router, create_static_router};
use super::state::AppState;

/// Interval between sweeps of the API throttle's idle keys.
const THROTTLE_CLEANUP_SECS: u64 = 300;

/// Web server for the site and admin API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server bound to the configured host and port.
    pub fn new(state: Arc<AppState>) -> Result<Self> {
        let web = &state.config.web;
        let addr = format!("{}:{}", web.host, web.port)
            .parse()
            .map_err(|e| HavenError::Config(format!("invalid web server address: {e}")))?;

        Ok(Self { addr, state })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn build_router(&self) -> Router {
        let web = &self.state.config.web;
        let mut router = create_router(self.state.clone()).merge(create_health_router());

        if web.serve_static {
            if let Some(static_router) = create_static_router(&web.static_path) {
                router = router.merge(static_router);
            }
        }

        router.layer(CompressionLayer::new())
    }

    /// Start the background tasks that drop stale limiter state.
    fn start_cleanup_tasks(&self) {
        self.state.limiter.start_cleanup_task();

        let state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(THROTTLE_CLEANUP_SECS));
            // Skip the first immediate tick
            interval.tick().await;
            loop {
                interval.tick().await;
                state.throttle.cleanup();
                tracing::debug!("Swept API throttle state");
            }
        });
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.start_cleanup_tasks();
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.start_cleanup_tasks();
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
