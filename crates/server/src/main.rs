mod bootstrap;
mod chat;
mod health;
mod sync;
mod widget;

use anyhow::Result;
use axum::Router;
use storebot_core::config::{AppConfig, LoadOptions};
use tower_http::cors::CorsLayer;

fn init_logging(config: &AppConfig) {
    use storebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let router = app_router(&app);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "storebot-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(event_name = "system.server.stopped", "storebot-server stopped");

    Ok(())
}

fn app_router(app: &bootstrap::Application) -> Router {
    // The widget runs on storefront origins, so every API route must answer
    // cross-origin requests.
    Router::new()
        .merge(chat::router(chat::ChatState::new(&app.db_pool, app.llm.clone())))
        .merge(sync::router(sync::SyncState::new(&app.db_pool)))
        .merge(widget::router(widget::WidgetState::new(
            &app.db_pool,
            app.config.server.public_origin.clone(),
        )))
        .merge(health::router(app.db_pool.clone()))
        .layer(CorsLayer::permissive())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
