//! Remote asset retrieval
//!
//! Downloads the clips and voiceover of a render job concurrently into its
//! workspace. The first failure aborts the remaining transfers.

use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::{Id, JoinSet};

use crate::config::FetchConfig;
use crate::error::{RenderError, Result};

/// One remote source and where to store it
#[derive(Debug, Clone)]
pub struct Asset {
    pub url: String,
    pub dest: PathBuf,
}

impl Asset {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
        }
    }
}

/// HTTP downloader for render inputs
#[derive(Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    /// Create a fetcher from configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RenderError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Download every asset concurrently.
    ///
    /// Succeeds only when all downloads succeed. On the first failure the
    /// other transfers are aborted and that failure is returned; partially
    /// written files are left in place.
    pub async fn fetch_all(&self, assets: Vec<Asset>) -> Result<()> {
        let mut set = JoinSet::new();
        let mut urls = HashMap::new();
        for asset in assets {
            let client = self.client.clone();
            let url = asset.url.clone();
            let handle = set.spawn(async move { download(&client, &asset).await });
            urls.insert(handle.id(), url);
        }
        join_downloads(set, urls).await
    }
}

/// Wait for every download task, aborting the rest on the first failure.
///
/// `urls` maps task ids to their source so a crashed task is still reported
/// against its URL.
async fn join_downloads(mut set: JoinSet<Result<()>>, mut urls: HashMap<Id, String>) -> Result<()> {
    while let Some(joined) = set.join_next_with_id().await {
        let outcome = match joined {
            Ok((_, outcome)) => outcome,
            Err(e) => Err(RenderError::Download {
                url: urls.remove(&e.id()).unwrap_or_default(),
                reason: format!("download task failed: {}", e),
            }),
        };
        if let Err(e) = outcome {
            set.abort_all();
            return Err(e);
        }
    }
    Ok(())
}

/// Stream a single URL to its destination file
async fn download(client: &reqwest::Client, asset: &Asset) -> Result<()> {
    let fail = |reason: String| RenderError::Download {
        url: asset.url.clone(),
        reason,
    };

    let url = reqwest::Url::parse(&asset.url).map_err(|e| fail(format!("invalid URL: {}", e)))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {}", status)));
    }

    let mut file = tokio::fs::File::create(&asset.dest)
        .await
        .map_err(|e| fail(format!("cannot create {}: {}", asset.dest.display(), e)))?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fail(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| fail(format!("write to {}: {}", asset.dest.display(), e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| fail(format!("write to {}: {}", asset.dest.display(), e)))?;

    tracing::debug!(
        "Downloaded {} ({} bytes) to {}",
        asset.url,
        written,
        asset.dest.display()
    );
    Ok(())
}
