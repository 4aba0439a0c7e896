//! Inkroom WebSocket Relay Server

use inkroom_server::{AppState, ServerConfig, router};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = Arc::new(AppState::new(config.channel_capacity));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Inkroom relay server listening on {}", config.bind);
    info!("WebSocket endpoint: ws://{}/ws", config.bind);

    axum::serve(listener, app).await
}
