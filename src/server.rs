//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::models::AppConfig;
use crate::services::{
    ChatGateway, ColorExtractor, CsvFeedbackStore, FeedbackStore, GeminiGateway,
    InMemorySessionStore, SessionStore,
};

/// Largest accepted request body (screenshots)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub extractor: Arc<ColorExtractor>,
    pub store: Arc<dyn FeedbackStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub gateway: Arc<dyn ChatGateway>,
}

/// Create application state with the Gemini gateway configured from the
/// environment.
pub fn create_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let gateway = GeminiGateway::from_env(config.chat.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create chat gateway: {e}"))?;
    Ok(create_app_state_with(config, Arc::new(gateway)))
}

/// Create application state around an existing chat gateway.
pub fn create_app_state_with(config: AppConfig, gateway: Arc<dyn ChatGateway>) -> AppState {
    let store = Arc::new(CsvFeedbackStore::new(&config.data_path));
    let extractor = Arc::new(ColorExtractor::new(config.extraction.clone()));
    let sessions = Arc::new(InMemorySessionStore::new(&config.sessions));

    tracing::info!(
        data_path = %config.data_path.display(),
        default_k = config.extraction.default_k,
        model = %config.chat.model,
        max_sessions = config.sessions.max_sessions,
        "Application state created"
    );

    AppState {
        config: Arc::new(config),
        extractor,
        store,
        sessions,
        gateway,
    }
}

/// Build the API router with all endpoints and middleware.
///
/// This is the core router used by both production and tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Palette analysis
        .route("/api/analyze", post(api::handle_analyze))
        // Chat sessions
        .route("/api/sessions", post(api::handle_create_session))
        .route(
            "/api/sessions/:id",
            get(api::handle_get_session).delete(api::handle_delete_session),
        )
        .route("/api/sessions/:id/ask", post(api::handle_ask))
        .route("/api/sessions/:id/stop", post(api::handle_stop))
        .route("/api/sessions/:id/analyze", post(api::handle_session_analyze))
        // Feedback and dashboard
        .route("/api/feedback/options", get(api::handle_feedback_options))
        .route("/api/feedback", post(api::handle_submit_feedback))
        .route("/api/dashboard", get(api::handle_dashboard))
        .route("/api/dashboard/export", get(api::handle_export))
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Add state and tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}
