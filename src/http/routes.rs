//! Axum router configuration

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::limits::render_admission_middleware;
use crate::state::AppState;

use super::handlers::{health_check, render, version_check};
use super::middleware::request_logger;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let admission = from_fn_with_state(state.limiter.clone(), render_admission_middleware);

    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Render job
        .route("/render", post(render).route_layer(admission))
        // Middleware
        .layer(DefaultBodyLimit::max(state.config.max_request_size_bytes()))
        .layer(from_fn(request_logger))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}
