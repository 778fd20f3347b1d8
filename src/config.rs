//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-clip presentation-timestamp multipliers
pub const DEFAULT_SPEED_FACTORS: [f64; 3] = [1.5, 1.5, 2.0];

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory under which per-request workspaces are created
    pub root: PathBuf,

    /// Age after which the reaper removes a workspace, in seconds
    pub ttl_secs: u64,

    /// How often the reaper runs, in seconds (0 disables it)
    pub reap_interval_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("temp"),
            ttl_secs: 3600,
            reap_interval_secs: 300,
        }
    }
}

impl WorkspaceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Media engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: String,

    /// setpts multipliers for clip 1, 2 and 3
    pub speed_factors: [f64; 3],

    /// Kill the engine after this many seconds (None waits forever)
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            speed_factors: DEFAULT_SPEED_FACTORS,
            timeout_secs: None,
        }
    }
}

/// Remote asset fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with downloads
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            user_agent: format!("render-server/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Workspace configuration
    pub workspace: WorkspaceConfig,

    /// Media engine configuration
    pub engine: EngineConfig,

    /// Fetch configuration
    pub fetch: FetchConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Maximum concurrent render jobs
    pub max_concurrent_renders: Option<usize>,

    /// Maximum request body size in megabytes
    pub max_request_size_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workspace: WorkspaceConfig::default(),
            engine: EngineConfig::default(),
            fetch: FetchConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            max_concurrent_renders: Some(4),
            max_request_size_mb: 10,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request body limit in bytes
    pub fn max_request_size_bytes(&self) -> usize {
        self.max_request_size_mb * 1024 * 1024
    }

    /// Apply the `PORT` environment override, if set and valid
    pub fn apply_port_override(&mut self, port: Option<String>) {
        if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
            self.port = port;
        }
    }
}
