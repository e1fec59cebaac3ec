use std::sync::Arc;

use tracing::info;

use haven::{AppState, Config, WebServer};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = haven::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        haven::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Haven - nonprofit site backend");
    info!(
        "Server configured on {}:{}",
        config.web.host, config.web.port
    );

    let state = match AppState::from_config(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize backends: {}", e);
            std::process::exit(1);
        }
    };

    let server = match WebServer::new(state) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
