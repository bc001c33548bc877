use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::audio::{AudioExtractor, ExtractError, FfmpegAudioExtractor};
use crate::config::Config;
use crate::fetcher::{FetchError, FetcherSet, MediaFetcher};
use crate::transcribe::{TranscribeError, Transcriber, TranscriptResult, WhisperClient};
use crate::utils;

/// A caller-supplied video reference, validated once and immutable after
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference(String);

impl VideoReference {
    /// Accept a reference: trimmed, non-empty, http(s) URL
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(PipelineError::InvalidInput(
                "a video reference is required".to_string(),
            ));
        }

        utils::parse_http_url(trimmed)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scoped resource region of one pipeline run.
///
/// Every temporary path is allocated through the scope and registered
/// before any bytes are written, so cleanup covers partial downloads on
/// every terminal state. Cleanup runs in reverse creation order, is
/// idempotent, and also fires on Drop so a cancelled request future still
/// releases its artifacts.
pub struct ArtifactScope {
    root: PathBuf,
    created: Mutex<Vec<PathBuf>>,
}

impl ArtifactScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Allocate a collision-free path for a new artifact and register it
    pub fn allocate(&self, label: &str, extension: &str) -> PathBuf {
        let path = self.root.join(utils::unique_filename(label, extension));

        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.clone());

        path
    }

    /// Paths allocated so far, oldest first
    pub fn created_paths(&self) -> Vec<PathBuf> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Delete every registered artifact, newest first. Deletion errors are
    /// logged and never replace an already-determined outcome.
    pub fn cleanup(&self) {
        let mut created = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some(path) = created.pop() {
            match fs_err::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact")
                }
            }
        }
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Caller-visible fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCategory {
    /// The request itself is at fault
    Client,
    /// The media could not be turned into usable audio
    Processing,
    /// A remote collaborator (media host or transcription service) failed
    Upstream,
    /// An unanticipated fault inside the pipeline
    Internal,
}

/// Closed failure taxonomy of one pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("could not resolve video reference: {0}")]
    ResolutionError(String),

    #[error("no audio-capable stream available: {0}")]
    NoStreamAvailable(String),

    #[error("media download failed: {0}")]
    TransportError(String),

    #[error("media contains no audio track")]
    NoAudioTrack,

    #[error("audio extraction failed: {0}")]
    CodecError(String),

    #[error("transcription service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("transcription service rejected the audio: {0}")]
    UnsupportedInput(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Stable machine-readable code for the response payload
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::ResolutionError(_) => "resolution_error",
            PipelineError::NoStreamAvailable(_) => "no_stream_available",
            PipelineError::TransportError(_) => "transport_error",
            PipelineError::NoAudioTrack => "no_audio_track",
            PipelineError::CodecError(_) => "codec_error",
            PipelineError::ServiceUnavailable(_) => "service_unavailable",
            PipelineError::UnsupportedInput(_) => "unsupported_input",
            PipelineError::InternalError(_) => "internal_error",
        }
    }

    pub fn category(&self) -> FaultCategory {
        match self {
            PipelineError::InvalidInput(_) => FaultCategory::Client,
            PipelineError::ResolutionError(_)
            | PipelineError::NoStreamAvailable(_)
            | PipelineError::TransportError(_)
            | PipelineError::ServiceUnavailable(_)
            | PipelineError::UnsupportedInput(_) => FaultCategory::Upstream,
            PipelineError::NoAudioTrack | PipelineError::CodecError(_) => {
                FaultCategory::Processing
            }
            PipelineError::InternalError(_) => FaultCategory::Internal,
        }
    }
}

// The From impls below are the single place stage failures become pipeline
// outcomes: declared kinds map one-to-one, anything uncategorized becomes
// InternalError.

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Resolution(m) => PipelineError::ResolutionError(m),
            FetchError::NoStreamAvailable(m) => PipelineError::NoStreamAvailable(m),
            FetchError::Transport(m) => PipelineError::TransportError(m),
            FetchError::Io(e) => PipelineError::InternalError(e.to_string()),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NoAudioTrack => PipelineError::NoAudioTrack,
            ExtractError::Codec(m) => PipelineError::CodecError(m),
            ExtractError::Io(e) => PipelineError::InternalError(e.to_string()),
        }
    }
}

impl From<TranscribeError> for PipelineError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::ServiceUnavailable(m) => PipelineError::ServiceUnavailable(m),
            TranscribeError::UnsupportedInput(m) => PipelineError::UnsupportedInput(m),
            TranscribeError::Io(e) => PipelineError::InternalError(e.to_string()),
        }
    }
}

/// Sequences fetch, extract, and transcribe for one request and owns the
/// lifecycle of every temporary artifact a run creates
pub struct PipelineController {
    fetcher: Box<dyn MediaFetcher>,
    extractor: Box<dyn AudioExtractor>,
    transcriber: Box<dyn Transcriber>,
    temp_root: TempDir,
}

impl PipelineController {
    /// Build the production pipeline from configuration
    pub fn new(config: &Config) -> crate::Result<Self> {
        let api_key = config.require_api_key()?;
        let transcriber = WhisperClient::new(&config.transcription, api_key)?;

        Self::with_stages(
            Box::new(FetcherSet::new(&config.app.yt_dlp_path)),
            Box::new(FfmpegAudioExtractor::new(
                &config.app.ffmpeg_path,
                &config.app.ffprobe_path,
            )),
            Box::new(transcriber),
            config.app.temp_dir.as_deref(),
        )
    }

    /// Assemble a pipeline from explicit stages
    pub fn with_stages(
        fetcher: Box<dyn MediaFetcher>,
        extractor: Box<dyn AudioExtractor>,
        transcriber: Box<dyn Transcriber>,
        temp_dir: Option<&Path>,
    ) -> crate::Result<Self> {
        let temp_root = match temp_dir {
            Some(dir) => TempDir::new_in(dir)?,
            None => TempDir::new()?,
        };

        Ok(Self {
            fetcher,
            extractor,
            transcriber,
            temp_root,
        })
    }

    /// Run the pipeline for one reference: fetch, extract, transcribe.
    ///
    /// Every artifact created during the run is deleted before this
    /// returns, whatever the outcome.
    pub async fn run(&self, reference: &str) -> Result<TranscriptResult, PipelineError> {
        let reference = VideoReference::parse(reference)?;

        let scope = ArtifactScope::new(self.temp_root.path());
        let outcome = self.run_stages(&reference, &scope).await;
        scope.cleanup();

        match &outcome {
            Ok(result) => {
                tracing::info!(reference = %reference, chars = result.text.len(), "transcription complete")
            }
            Err(err) => {
                tracing::warn!(reference = %reference, code = err.code(), error = %err, "pipeline failed")
            }
        }

        outcome
    }

    async fn run_stages(
        &self,
        reference: &VideoReference,
        scope: &ArtifactScope,
    ) -> Result<TranscriptResult, PipelineError> {
        let media = self.fetcher.fetch(reference, scope).await?;
        let audio = self.extractor.extract(&media, scope).await?;
        let transcript = self.transcriber.transcribe(&audio).await?;

        Ok(transcript)
    }
}
