use crate::error::RenderError;
use crate::render::RenderRequest;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Version information endpoint
pub async fn version_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "ffmpeg": state.renderer.engine().describe(),
    }))
}

/// Render endpoint: composite the clips and return the MP4
pub async fn render(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, RenderError> {
    let Json(request) = payload.map_err(|e| RenderError::InvalidBody(e.body_text()))?;

    let output = state.renderer.render(request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline; filename=\"final.mp4\""),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(output.len));

    Ok((headers, Body::from_stream(output.into_stream())).into_response())
}
