// Routes module - wires every HTTP endpoint onto the shared engine state

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::{get_events, health_check, run_query, submit_call};

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // ===== CALLS (mutating, atomic) =====
        .route("/rpc/call", post(submit_call))
        // ===== QUERIES (read-only) =====
        .route("/rpc/query", post(run_query))
        .route("/events", get(get_events))
        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
