pub mod handlers;
mod page;
pub mod types;

use crate::{config::Config, session::SessionStore, shell::Shell, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/questions", get(handlers::questions))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/:session_id/image",
            get(handlers::get_image).post(handlers::upload_image),
        )
        .route(
            "/api/sessions/:session_id/questions/:index",
            post(handlers::ask_question),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    // Secrets are read once here and handed down, never stored globally
    let token = config.registry.resolve_token().await?;

    let shell = Shell::new(&config, token);
    let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl_secs));

    // Create application state
    let app_state = AppState {
        shell: Arc::new(shell),
        sessions: Arc::new(sessions),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let app = router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
