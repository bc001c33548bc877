use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{FetchError, MediaArtifact, MediaFetcher};
use crate::pipeline::{ArtifactScope, VideoReference};
use crate::utils::last_stderr_line;

/// Catch-all fetcher backed by yt-dlp, which handles YouTube and most
/// other video hosting sites
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

/// Subset of `yt-dlp --dump-json` output this fetcher needs
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    title: Option<String>,
    #[serde(default)]
    formats: Vec<Rendition>,
}

/// One entry of the rendition (format) list a resource offers
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Rendition {
    pub(crate) format_id: String,
    #[serde(default)]
    pub(crate) acodec: Option<String>,
    #[serde(default)]
    pub(crate) vcodec: Option<String>,
    #[serde(default)]
    pub(crate) ext: Option<String>,
    #[serde(default)]
    pub(crate) abr: Option<f64>,
}

impl Rendition {
    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

fn by_audio_bitrate(a: &&Rendition, b: &&Rendition) -> Ordering {
    let a = a.abr.unwrap_or(0.0);
    let b = b.abr.unwrap_or(0.0);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Pick one rendition to download: the pipeline only needs audio, so an
/// audio-only rendition is preferred; otherwise a combined audio+video
/// rendition, favoring the mp4 container.
pub(crate) fn select_rendition(formats: &[Rendition]) -> Option<&Rendition> {
    if let Some(best) = formats
        .iter()
        .filter(|r| r.is_audio_only())
        .max_by(by_audio_bitrate)
    {
        return Some(best);
    }

    let combined = formats.iter().filter(|r| r.has_audio() && r.has_video());

    combined
        .clone()
        .filter(|r| r.ext.as_deref() == Some("mp4"))
        .max_by(by_audio_bitrate)
        .or_else(|| combined.max_by(by_audio_bitrate))
}

/// Split probe failures into "the reference does not resolve" and
/// "the network/service misbehaved" by inspecting yt-dlp's stderr
pub(crate) fn classify_probe_failure(stderr: &str) -> FetchError {
    let lowered = stderr.to_lowercase();
    let transport_markers = [
        "timed out",
        "connection",
        "network",
        "temporary failure",
        "http error 5",
        "unable to download webpage",
    ];

    if transport_markers.iter().any(|m| lowered.contains(m)) {
        FetchError::Transport(last_stderr_line(stderr))
    } else {
        FetchError::Resolution(last_stderr_line(stderr))
    }
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
        }
    }

    /// Resolve the reference and list its renditions
    async fn probe(&self, reference: &str) -> Result<VideoMetadata, FetchError> {
        tracing::debug!(reference, "probing video metadata");

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", reference])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_probe_failure(&stderr));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::Resolution(format!("unparseable video metadata: {}", e)))
    }

    /// Download one selected rendition into `target`
    async fn download(
        &self,
        reference: &str,
        format_id: &str,
        target: &Path,
    ) -> Result<(), FetchError> {
        tracing::debug!(reference, format_id, "downloading rendition");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--format",
                format_id,
                "--output",
                &target.to_string_lossy(),
                "--no-playlist",
                "--no-progress",
                "--quiet",
                reference,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Transport(last_stderr_line(&stderr)));
        }

        let size = fs_err::metadata(target)?.len();
        if size == 0 {
            return Err(FetchError::Transport(
                "downloaded rendition is empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn supports(&self, _reference: &VideoReference) -> bool {
        // Catch-all: yt-dlp resolves hundreds of hosting sites and reports
        // unsupported ones itself
        true
    }

    async fn fetch(
        &self,
        reference: &VideoReference,
        scope: &ArtifactScope,
    ) -> Result<MediaArtifact, FetchError> {
        let metadata = self.probe(reference.as_str()).await?;

        let rendition = select_rendition(&metadata.formats).ok_or_else(|| {
            FetchError::NoStreamAvailable(format!(
                "none of {} renditions carries audio",
                metadata.formats.len()
            ))
        })?;

        let container = rendition.ext.clone().unwrap_or_else(|| "mp4".to_string());
        let target = scope.allocate("media", &container);

        self.download(reference.as_str(), &rendition.format_id, &target)
            .await?;

        Ok(MediaArtifact {
            path: target,
            container,
            title: metadata.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(id: &str, acodec: &str, vcodec: &str, ext: &str, abr: Option<f64>) -> Rendition {
        Rendition {
            format_id: id.to_string(),
            acodec: Some(acodec.to_string()),
            vcodec: Some(vcodec.to_string()),
            ext: Some(ext.to_string()),
            abr,
        }
    }

    #[test]
    fn test_prefers_audio_only_rendition() {
        let formats = vec![
            rendition("18", "mp4a.40.2", "avc1", "mp4", Some(96.0)),
            rendition("140", "mp4a.40.2", "none", "m4a", Some(128.0)),
            rendition("139", "mp4a.40.2", "none", "m4a", Some(48.0)),
        ];

        let selected = select_rendition(&formats).unwrap();
        assert_eq!(selected.format_id, "140");
    }

    #[test]
    fn test_falls_back_to_combined_mp4() {
        let formats = vec![
            rendition("vp9", "opus", "vp9", "webm", Some(160.0)),
            rendition("18", "mp4a.40.2", "avc1", "mp4", Some(96.0)),
            rendition("247", "none", "vp9", "webm", None),
        ];

        let selected = select_rendition(&formats).unwrap();
        assert_eq!(selected.format_id, "18");
    }

    #[test]
    fn test_no_audio_capable_rendition() {
        let formats = vec![
            rendition("247", "none", "vp9", "webm", None),
            rendition("248", "none", "avc1", "mp4", None),
        ];

        assert!(select_rendition(&formats).is_none());
        assert!(select_rendition(&[]).is_none());
    }

    #[test]
    fn test_classify_probe_failure() {
        let resolution = classify_probe_failure("ERROR: [youtube] abc: Video unavailable");
        assert!(matches!(resolution, FetchError::Resolution(_)));

        let transport =
            classify_probe_failure("ERROR: Unable to download webpage: timed out");
        assert!(matches!(transport, FetchError::Transport(_)));
    }
}
