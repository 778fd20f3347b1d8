//! Render orchestration
//!
//! Validates a request, allocates its workspace, downloads the assets while
//! writing the subtitle track, runs the media engine and returns the output.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::ReaderStream;

use crate::compose::{CompositionPlan, SpeedPolicy};
use crate::engine::MediaEngine;
use crate::error::{RenderError, Result};
use crate::fetch::{Asset, AssetFetcher};
use crate::subtitle::{generate_srt, parse_captions, CaptionEntry};
use crate::workspace::{ActiveGuard, ActiveWorkspaces, Workspace};

/// Raw body of `POST /render`.
///
/// Every field is optional here so that absent fields are reported as a
/// validation failure rather than a body decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderRequest {
    pub video1: Option<String>,
    pub video2: Option<String>,
    pub video3: Option<String>,
    pub voiceover: Option<String>,
    pub captions: Option<serde_json::Value>,
}

/// A request with all required fields present
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub videos: [String; 3],
    pub voiceover: String,
    pub captions: serde_json::Value,
}

impl RenderRequest {
    /// Check field presence without performing any I/O
    pub fn validate(self) -> Result<RenderJob> {
        let mut missing = Vec::new();

        let mut url = |name: &'static str, value: Option<String>| match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(name);
                String::new()
            }
        };
        let video1 = url("video1", self.video1);
        let video2 = url("video2", self.video2);
        let video3 = url("video3", self.video3);
        let voiceover = url("voiceover", self.voiceover);

        let captions = match self.captions {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Array(items)) if items.is_empty() => None,
            Some(value) => Some(value),
        };
        if captions.is_none() {
            missing.push("captions");
        }

        match captions {
            Some(captions) if missing.is_empty() => Ok(RenderJob {
                videos: [video1, video2, video3],
                voiceover,
                captions,
            }),
            _ => Err(RenderError::MissingFields(missing)),
        }
    }
}

/// Composited file of a finished render, opened for streaming
#[derive(Debug)]
pub struct RenderOutput {
    /// Workspace the file lives in
    pub workspace: Workspace,
    /// Output size in bytes
    pub len: u64,
    file: tokio::fs::File,
    guard: ActiveGuard,
}

impl RenderOutput {
    /// Stream the file in chunks.
    ///
    /// The workspace stays protected from the reaper until the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let guard = self.guard;
        ReaderStream::new(self.file).map(move |chunk| {
            let _in_use = &guard;
            chunk
        })
    }
}

/// Drives one render job end to end
pub struct Renderer {
    fetcher: AssetFetcher,
    engine: Arc<dyn MediaEngine>,
    workspace_root: PathBuf,
    speed: SpeedPolicy,
    active: ActiveWorkspaces,
}

impl Renderer {
    pub fn new(
        fetcher: AssetFetcher,
        engine: Arc<dyn MediaEngine>,
        workspace_root: PathBuf,
        speed: SpeedPolicy,
    ) -> Self {
        Self {
            fetcher,
            engine,
            workspace_root,
            speed,
            active: ActiveWorkspaces::new(),
        }
    }

    /// The engine this renderer invokes
    pub fn engine(&self) -> &dyn MediaEngine {
        self.engine.as_ref()
    }

    /// Workspaces with a render or response still in flight
    pub fn active_workspaces(&self) -> ActiveWorkspaces {
        self.active.clone()
    }

    /// Render a request and open the composited file
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutput> {
        let job = request.validate()?;
        let started = Instant::now();

        let (workspace, guard) = Workspace::allocate(&self.workspace_root, &self.active).await?;
        tracing::info!("Render {} started in {}", workspace.id, workspace.dir.display());

        match self.run(&workspace, job).await {
            Ok((file, len)) => {
                tracing::info!(
                    "Render {} finished: {} bytes in {:?}",
                    workspace.id,
                    len,
                    started.elapsed()
                );
                Ok(RenderOutput {
                    workspace,
                    len,
                    file,
                    guard,
                })
            }
            Err(e) => {
                tracing::warn!("Render {} failed: {}", workspace.id, e);
                Err(e)
            }
        }
    }

    async fn run(&self, workspace: &Workspace, job: RenderJob) -> Result<(tokio::fs::File, u64)> {
        let [v1, v2, v3] = job.videos;
        let [d1, d2, d3] = workspace.videos.clone();
        let assets = vec![
            Asset::new(v1, d1),
            Asset::new(v2, d2),
            Asset::new(v3, d3),
            Asset::new(job.voiceover, workspace.voiceover.clone()),
        ];

        // Captions need no network; write them while the downloads run
        tokio::try_join!(
            self.fetcher.fetch_all(assets),
            write_subtitles(workspace, job.captions),
        )?;
        tracing::debug!("Render {} inputs ready", workspace.id);

        let plan = CompositionPlan::new(workspace, self.speed);
        tracing::info!("Render {} running {}", workspace.id, self.engine.describe());
        self.engine.run(&plan).await?;

        let file = tokio::fs::File::open(&workspace.output)
            .await
            .map_err(RenderError::Output)?;
        let len = file.metadata().await.map_err(RenderError::Output)?.len();
        Ok((file, len))
    }
}

/// Decode the captions and persist them as the workspace's SRT track
async fn write_subtitles(workspace: &Workspace, captions: serde_json::Value) -> Result<()> {
    let captions: Vec<CaptionEntry> = parse_captions(captions)?;
    let srt = generate_srt(&captions);
    tokio::fs::write(&workspace.subtitles, srt)
        .await
        .map_err(RenderError::SubtitleWrite)?;
    tracing::debug!(
        "Wrote {} cues to {}",
        captions.len(),
        workspace.subtitles.display()
    );
    Ok(())
}
