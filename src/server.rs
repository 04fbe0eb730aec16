use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::handler::{
        get_bot_action, get_bot_config, get_bot_stats, health_check, list_bot_actions, AppState,
    },
    error::AppResult,
    keeper::ShutdownSignal,
    middleware::create_cors_layer,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api",
            Router::new()
                .route("/bot-actions", get(list_bot_actions))
                .route("/bot-actions/:tx_hash", get(get_bot_action))
                .route("/bot-stats", get(get_bot_stats))
                .route("/bot-config", get(get_bot_config)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer())
                .layer(CompressionLayer::new()),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

/// Serve until the shutdown signal fires
pub async fn run_server(app: Router, bind_address: &str, shutdown: ShutdownSignal) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;

    info!("Server stopped");
    Ok(())
}
