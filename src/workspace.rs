//! Per-request working directories
//!
//! Every render owns a directory named by a fresh UUID under the configured
//! root. The request path never deletes it; [`reap_expired`] removes
//! workspaces older than the configured TTL unless a render still holds them.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// File paths owned by one render job
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Unique job id, also the directory name
    pub id: String,
    /// The workspace directory
    pub dir: PathBuf,
    /// Downloaded clips, in concatenation order
    pub videos: [PathBuf; 3],
    /// Downloaded voiceover track
    pub voiceover: PathBuf,
    /// Generated subtitle track
    pub subtitles: PathBuf,
    /// Composited output
    pub output: PathBuf,
}

impl Workspace {
    /// Lay out the file paths for a workspace directory without touching disk
    pub fn layout(id: String, dir: PathBuf) -> Self {
        Self {
            videos: [dir.join("v1.mp4"), dir.join("v2.mp4"), dir.join("v3.mp4")],
            voiceover: dir.join("voiceover.mp3"),
            subtitles: dir.join("subtitles.srt"),
            output: dir.join("final.mp4"),
            id,
            dir,
        }
    }

    /// Create a fresh, uniquely named workspace under `root`.
    ///
    /// The id is registered in `active` before the directory exists, so the
    /// reaper never sees it unguarded.
    pub async fn allocate(
        root: &Path,
        active: &ActiveWorkspaces,
    ) -> Result<(Self, ActiveGuard)> {
        let id = Uuid::new_v4().to_string();
        let guard = active.track(&id);
        let dir = root.join(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(RenderError::Workspace)?;
        tracing::debug!("Allocated workspace {}", dir.display());
        Ok((Self::layout(id, dir), guard))
    }
}

/// Ids of workspaces whose render is still in progress
#[derive(Debug, Clone, Default)]
pub struct ActiveWorkspaces {
    ids: Arc<Mutex<HashSet<String>>>,
}

/// Marks a workspace in use until dropped
#[derive(Debug)]
pub struct ActiveGuard {
    id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.id);
    }
}

impl ActiveWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as in use
    pub fn track(&self, id: &str) -> ActiveGuard {
        self.ids.lock().insert(id.to_string());
        ActiveGuard {
            id: id.to_string(),
            ids: Arc::clone(&self.ids),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Remove workspace directories under `root` last modified more than `ttl` ago,
/// skipping those in `active`.
///
/// Returns the number of directories removed. A missing root is not an error.
pub fn reap_expired(
    root: &Path,
    ttl: Duration,
    active: &ActiveWorkspaces,
) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries {
        // Entries can vanish mid-sweep
        let (entry, metadata) = match entry.and_then(|e| e.metadata().map(|m| (e, m))) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Skipping workspace entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }
        // Only touch directories this server created
        let name = entry.file_name().to_string_lossy().to_string();
        if Uuid::parse_str(&name).is_err() || active.contains(&name) {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < ttl {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                "Failed to remove expired workspace {}: {}",
                entry.path().display(),
                e
            ),
        }
    }
    Ok(removed)
}
