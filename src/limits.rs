//! Render admission control
//!
//! Every render spawns its own engine process and file set, so the number of
//! renders in flight is capped. Requests beyond the cap get 503.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::RenderError;

/// Counts in-flight renders against a ceiling
#[derive(Debug)]
pub struct RenderLimiter {
    /// Renders currently running
    active: Mutex<usize>,
    /// Maximum concurrent renders (None = unlimited)
    max_active: Option<usize>,
}

/// Slot held for the duration of one render
#[derive(Debug)]
pub struct RenderPermit {
    limiter: Arc<RenderLimiter>,
}

impl Drop for RenderPermit {
    fn drop(&mut self) {
        let mut active = self.limiter.active.lock();
        *active = active.saturating_sub(1);
    }
}

impl RenderLimiter {
    pub fn new(max_active: Option<usize>) -> Self {
        Self {
            active: Mutex::new(0),
            max_active,
        }
    }

    /// Try to take a render slot
    pub fn try_acquire(self: &Arc<Self>) -> Option<RenderPermit> {
        let mut active = self.active.lock();
        if let Some(max) = self.max_active {
            if *active >= max {
                return None;
            }
        }
        *active += 1;
        Some(RenderPermit {
            limiter: Arc::clone(self),
        })
    }

    /// Get current render count
    pub fn active_count(&self) -> usize {
        *self.active.lock()
    }
}

/// Admission middleware for the render route
pub async fn render_admission_middleware(
    State(limiter): State<Arc<RenderLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(_permit) = limiter.try_acquire() else {
        tracing::warn!(
            "Rejecting render: {} already in flight",
            limiter.active_count()
        );
        return RenderError::Busy.into_response();
    };

    next.run(request).await
}

/// Create render limiter from config
pub fn create_render_limiter(config: &crate::config::ServerConfig) -> Arc<RenderLimiter> {
    Arc::new(RenderLimiter::new(config.max_concurrent_renders))
}
