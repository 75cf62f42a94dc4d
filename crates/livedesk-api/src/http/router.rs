//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.
//! `/health` is unauthenticated; everything else requires an API key.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Session lifecycle
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route("/sessions/{id}", get(handlers::session::get_session))
        .route("/sessions/{id}/claim", post(handlers::session::claim_session))
        .route("/sessions/{id}/close", post(handlers::session::close_session))
        .route(
            "/sessions/{id}/forward",
            post(handlers::session::forward_session),
        )
        // Messages
        .route(
            "/sessions/{id}/messages",
            post(handlers::message::send_message).get(handlers::message::poll_messages),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
