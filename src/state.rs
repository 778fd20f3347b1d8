//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The render pipeline (fetcher, engine, workspace root)
//! - The render admission limiter
//! - Server configuration

use std::sync::Arc;

use crate::compose::SpeedPolicy;
use crate::config::ServerConfig;
use crate::engine::{FfmpegEngine, MediaEngine};
use crate::error::Result;
use crate::fetch::AssetFetcher;
use crate::limits::{create_render_limiter, RenderLimiter};
use crate::render::Renderer;

/// Application state shared across all handlers
pub struct AppState {
    /// Render pipeline
    pub renderer: Renderer,

    /// In-flight render limiter
    pub limiter: Arc<RenderLimiter>,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState using the ffmpeg binary from the configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        let engine = Arc::new(FfmpegEngine::new(&config.engine));
        Self::with_engine(config, engine)
    }

    /// Create a new AppState with a specific media engine
    pub fn with_engine(config: ServerConfig, engine: Arc<dyn MediaEngine>) -> Result<Self> {
        let fetcher = AssetFetcher::new(&config.fetch)?;
        let renderer = Renderer::new(
            fetcher,
            engine,
            config.workspace.root.clone(),
            SpeedPolicy::new(config.engine.speed_factors),
        );
        Ok(Self {
            renderer,
            limiter: create_render_limiter(&config),
            config,
        })
    }
}
