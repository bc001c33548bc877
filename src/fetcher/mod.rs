use async_trait::async_trait;
use std::path::PathBuf;

pub mod direct;
pub mod ytdlp;

use crate::pipeline::{ArtifactScope, VideoReference};

/// Downloaded media materialized as a per-request temporary file
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    /// Location of the downloaded bytes, registered with the owning scope
    pub path: PathBuf,

    /// Container format (file extension) of the selected rendition
    pub container: String,

    /// Display title when the source provides one
    pub title: Option<String>,
}

/// Failure kinds the fetch stage reports.
///
/// `Io` covers local faults outside this closed set (disk, subprocess
/// spawning); the pipeline maps it to an internal error.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("could not resolve video reference: {0}")]
    Resolution(String),

    #[error("no audio-capable rendition available: {0}")]
    NoStreamAvailable(String),

    #[error("transport failure while downloading: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for retrieving remote media as a local artifact
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Get the name of this fetcher, for logs
    fn name(&self) -> &'static str;

    /// Check if this fetcher handles the given reference
    fn supports(&self, reference: &VideoReference) -> bool;

    /// Retrieve the media behind `reference` into a scope-allocated file
    async fn fetch(
        &self,
        reference: &VideoReference,
        scope: &ArtifactScope,
    ) -> Result<MediaArtifact, FetchError>;
}

/// Ordered set of fetchers; the first one that supports a reference wins
pub struct FetcherSet {
    fetchers: Vec<Box<dyn MediaFetcher>>,
}

impl FetcherSet {
    /// Default set: direct media URLs first, yt-dlp as the catch-all
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            fetchers: vec![
                Box::new(direct::DirectFetcher::new()),
                Box::new(ytdlp::YtDlpFetcher::new(yt_dlp_path)),
            ],
        }
    }
}

#[async_trait]
impl MediaFetcher for FetcherSet {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn supports(&self, reference: &VideoReference) -> bool {
        self.fetchers.iter().any(|f| f.supports(reference))
    }

    async fn fetch(
        &self,
        reference: &VideoReference,
        scope: &ArtifactScope,
    ) -> Result<MediaArtifact, FetchError> {
        let fetcher = self
            .fetchers
            .iter()
            .find(|f| f.supports(reference))
            .ok_or_else(|| {
                FetchError::Resolution(format!("no fetcher handles {}", reference))
            })?;

        tracing::info!(fetcher = fetcher.name(), reference = %reference, "fetching media");

        let artifact = fetcher.fetch(reference, scope).await?;

        tracing::info!(
            path = %artifact.path.display(),
            container = %artifact.container,
            title = artifact.title.as_deref().unwrap_or(""),
            "media fetched"
        );

        Ok(artifact)
    }
}
