//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the render, health and version endpoints
//! - Render request handler
//! - Request logging middleware
//! - CORS middleware

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
