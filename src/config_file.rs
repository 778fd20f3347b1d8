//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, FetchConfig, ServerConfig, WorkspaceConfig};
use crate::error::{RenderError, Result};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Workspace settings
    pub workspace: Option<WorkspaceSettings>,
    /// Engine settings
    pub engine: Option<EngineSettings>,
    /// Fetch settings
    pub fetch: Option<FetchSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Directory holding per-request workspaces
    pub root: PathBuf,
    /// Workspace lifetime in seconds
    pub ttl_secs: Option<u64>,
    /// Reaper period in seconds
    pub reap_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// ffmpeg binary
    pub ffmpeg_path: Option<String>,
    /// setpts multipliers for the three clips
    pub speed_factors: Option<[f64; 3]>,
    /// Engine timeout in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
    /// User-Agent header
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum concurrent render jobs
    pub max_concurrent_renders: Option<usize>,
    /// Maximum request body size in MB
    pub max_request_size_mb: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| RenderError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RenderError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(defaults.cors_enabled),
            },
            workspace: Some(WorkspaceSettings {
                root: defaults.workspace.root,
                ttl_secs: Some(defaults.workspace.ttl_secs),
                reap_interval_secs: Some(defaults.workspace.reap_interval_secs),
            }),
            engine: Some(EngineSettings {
                ffmpeg_path: Some(defaults.engine.ffmpeg_path),
                speed_factors: Some(defaults.engine.speed_factors),
                timeout_secs: None,
            }),
            fetch: Some(FetchSettings {
                connect_timeout_secs: Some(defaults.fetch.connect_timeout_secs),
                user_agent: None,
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
            limits: Some(LimitsSettings {
                max_concurrent_renders: defaults.max_concurrent_renders,
                max_request_size_mb: Some(defaults.max_request_size_mb),
            }),
        }
    }

    /// Convert to ServerConfig, filling unset values with defaults
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let workspace = match self.workspace {
            Some(w) => WorkspaceConfig {
                root: w.root,
                ttl_secs: w.ttl_secs.unwrap_or(defaults.workspace.ttl_secs),
                reap_interval_secs: w
                    .reap_interval_secs
                    .unwrap_or(defaults.workspace.reap_interval_secs),
            },
            None => defaults.workspace,
        };

        let engine = match self.engine {
            Some(e) => EngineConfig {
                ffmpeg_path: e.ffmpeg_path.unwrap_or(defaults.engine.ffmpeg_path),
                speed_factors: e.speed_factors.unwrap_or(defaults.engine.speed_factors),
                timeout_secs: e.timeout_secs,
            },
            None => defaults.engine,
        };

        let fetch = match self.fetch {
            Some(f) => FetchConfig {
                connect_timeout_secs: f
                    .connect_timeout_secs
                    .unwrap_or(defaults.fetch.connect_timeout_secs),
                user_agent: f.user_agent.unwrap_or(defaults.fetch.user_agent),
            },
            None => defaults.fetch,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            workspace,
            engine,
            fetch,
            cors_enabled: self.server.cors_enabled.unwrap_or(defaults.cors_enabled),
            log_level,
            log_format,
            max_concurrent_renders: match &self.limits {
                Some(l) => l.max_concurrent_renders,
                None => defaults.max_concurrent_renders,
            },
            max_request_size_mb: self
                .limits
                .as_ref()
                .and_then(|l| l.max_request_size_mb)
                .unwrap_or(defaults.max_request_size_mb),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
