//! External media engine
//!
//! The render pipeline hands a [`CompositionPlan`] to a [`MediaEngine`].
//! The production engine spawns the ffmpeg binary with an argument vector.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::compose::CompositionPlan;
use crate::config::EngineConfig;
use crate::error::{RenderError, Result};

/// Maximum number of stderr bytes kept for error reports
const STDERR_TAIL_BYTES: usize = 4096;

/// Runs a composition plan to produce its output file
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Execute the plan, blocking until the output is written or the engine fails
    async fn run(&self, plan: &CompositionPlan) -> Result<()>;

    /// Human readable engine description
    fn describe(&self) -> String;
}

/// ffmpeg command-line engine
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: String,
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn run(&self, plan: &CompositionPlan) -> Result<()> {
        let args = plan.args();
        tracing::debug!("Running {} {}", self.binary, args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::EngineNotFound(self.binary.clone())
                } else {
                    RenderError::EngineIo(e)
                }
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RenderError::EngineTimeout(limit.as_secs()))?,
            None => child.wait_with_output().await,
        }
        .map_err(RenderError::EngineIo)?;

        if !output.status.success() {
            return Err(RenderError::EngineFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.binary.clone()
    }
}

/// Last part of the engine's diagnostic output, trimmed
fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording engine used by pipeline tests

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed payload to the plan's output, or fails on demand
    pub struct FakeEngine {
        pub payload: Vec<u8>,
        pub fail_with: Option<String>,
        pub calls: AtomicUsize,
        pub last_args: Mutex<Option<Vec<String>>>,
    }

    impl FakeEngine {
        pub fn succeeding(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                fail_with: None,
                calls: AtomicUsize::new(0),
                last_args: Mutex::new(None),
            }
        }

        pub fn failing(stderr: &str) -> Self {
            Self {
                fail_with: Some(stderr.to_string()),
                ..Self::succeeding(b"")
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn run(&self, plan: &CompositionPlan) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_args.lock() = Some(plan.args());

            if let Some(stderr) = &self.fail_with {
                return Err(RenderError::EngineFailed {
                    status: "exit status: 1".to_string(),
                    stderr: stderr.clone(),
                });
            }
            tokio::fs::write(&plan.output, &self.payload).await?;
            Ok(())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SpeedPolicy;
    use crate::workspace::Workspace;
    use std::path::PathBuf;

    fn plan() -> CompositionPlan {
        let ws = Workspace::layout("job".to_string(), PathBuf::from("/nonexistent/job"));
        CompositionPlan::new(&ws, SpeedPolicy::default())
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let engine = FfmpegEngine::new(&EngineConfig {
            ffmpeg_path: "/nonexistent/bin/ffmpeg-render-test".to_string(),
            ..Default::default()
        });
        let err = engine.run(&plan()).await.unwrap_err();
        assert!(matches!(err, RenderError::EngineNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_engine_failure() {
        // `false` ignores its arguments and exits 1
        let engine = FfmpegEngine::new(&EngineConfig {
            ffmpeg_path: "false".to_string(),
            ..Default::default()
        });
        let err = engine.run(&plan()).await.unwrap_err();
        assert!(matches!(err, RenderError::EngineFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let engine = FfmpegEngine::new(&EngineConfig {
            ffmpeg_path: "true".to_string(),
            ..Default::default()
        });
        engine.run(&plan()).await.unwrap();
    }

    #[cfg(unix)]
    fn script(dir: &std::path::Path, name: &str, body: &str, mode: u32) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_slow_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new(&EngineConfig {
            ffmpeg_path: script(dir.path(), "slow-ffmpeg", "#!/bin/sh\nsleep 30\n", 0o755),
            timeout_secs: Some(1),
            ..Default::default()
        });

        let started = std::time::Instant::now();
        let err = engine.run(&plan()).await.unwrap_err();

        assert!(matches!(err, RenderError::EngineTimeout(1)));
        assert_eq!(err.summary(), "FFmpeg failed");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unexecutable_binary_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new(&EngineConfig {
            ffmpeg_path: script(dir.path(), "ffmpeg", "not a program\n", 0o644),
            ..Default::default()
        });

        let err = engine.run(&plan()).await.unwrap_err();

        assert!(matches!(err, RenderError::EngineIo(_)));
        assert_eq!(err.summary(), "FFmpeg failed");
    }

    #[test]
    fn test_stderr_tail() {
        let long = vec![b'x'; STDERR_TAIL_BYTES * 2];
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_BYTES);
        assert_eq!(stderr_tail(b"  error: boom\n"), "error: boom");
    }
}
