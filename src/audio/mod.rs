use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::fetcher::MediaArtifact;
use crate::pipeline::ArtifactScope;
use crate::utils::last_stderr_line;

/// Audio encodings the transcription service accepts natively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Audio track of one media artifact, in a service-accepted encoding.
/// Shares the media artifact's file when no demuxing was needed.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub format: AudioFormat,
}

/// Failure kinds the extraction stage reports.
///
/// `Io` covers local faults outside this closed set; the pipeline maps it
/// to an internal error.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("media contains no audio track")]
    NoAudioTrack,

    #[error("codec failure: {0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for isolating the audio track of downloaded media
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Produce an audio-only artifact for `media`
    async fn extract(
        &self,
        media: &MediaArtifact,
        scope: &ArtifactScope,
    ) -> Result<AudioArtifact, ExtractError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct StreamSummary {
    has_audio: bool,
    has_video: bool,
}

fn summarize(probe: &ProbeOutput) -> StreamSummary {
    let kind = |wanted: &str| {
        probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some(wanted))
    };

    StreamSummary {
        has_audio: kind("audio"),
        has_video: kind("video"),
    }
}

/// Pass-through decision: an audio-only container in an accepted encoding
/// needs no re-encode
fn passthrough_format(summary: StreamSummary, container: &str) -> Option<AudioFormat> {
    if summary.has_video {
        return None;
    }

    AudioFormat::from_extension(container)
}

/// Audio extraction backed by ffprobe/ffmpeg
pub struct FfmpegAudioExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegAudioExtractor {
    pub fn new(ffmpeg_path: &str, ffprobe_path: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            ffprobe_path: ffprobe_path.to_string(),
        }
    }

    /// Inspect the media artifact's streams
    async fn probe(&self, path: &Path) -> Result<StreamSummary, ExtractError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                &path.to_string_lossy(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Codec(format!(
                "ffprobe could not read media: {}",
                last_stderr_line(&stderr)
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractError::Codec(format!("unparseable ffprobe output: {}", e)))?;

        Ok(summarize(&probe))
    }

    /// Demux and encode the audio track to the canonical encoding:
    /// MP3, 16 kHz, mono
    async fn encode_mp3(&self, source: &Path, target: &Path) -> Result<(), ExtractError> {
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            "encoding audio track"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-i",
                &source.to_string_lossy(),
                "-vn",
                "-acodec",
                "libmp3lame",
                "-ar",
                "16000",
                "-ac",
                "1",
                "-b:a",
                "64k",
                "-y",
                &target.to_string_lossy(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Codec(last_stderr_line(&stderr)));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(
        &self,
        media: &MediaArtifact,
        scope: &ArtifactScope,
    ) -> Result<AudioArtifact, ExtractError> {
        let summary = self.probe(&media.path).await?;

        if !summary.has_audio {
            return Err(ExtractError::NoAudioTrack);
        }

        if let Some(format) = passthrough_format(summary, &media.container) {
            tracing::debug!(path = %media.path.display(), "audio-only media, no demux needed");
            return Ok(AudioArtifact {
                path: media.path.clone(),
                format,
            });
        }

        let target = scope.allocate("audio", AudioFormat::Mp3.as_str());

        match self.encode_mp3(&media.path, &target).await {
            Ok(()) => Ok(AudioArtifact {
                path: target,
                format: AudioFormat::Mp3,
            }),
            Err(err) => {
                // Never surface a partially written artifact
                if target.exists() {
                    let _ = fs_err::remove_file(&target);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_from(json: &str) -> ProbeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("aac"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_extension("opus"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_extension("avi"), None);
    }

    #[test]
    fn test_summarize_streams() {
        let probe = probe_from(
            r#"{"streams": [{"codec_type": "video"}, {"codec_type": "audio"}]}"#,
        );
        let summary = summarize(&probe);
        assert!(summary.has_audio);
        assert!(summary.has_video);

        let silent = probe_from(r#"{"streams": [{"codec_type": "video"}]}"#);
        assert!(!summarize(&silent).has_audio);

        let empty = probe_from(r#"{}"#);
        assert!(!summarize(&empty).has_audio);
        assert!(!summarize(&empty).has_video);
    }

    #[test]
    fn test_passthrough_decision() {
        let audio_only = StreamSummary {
            has_audio: true,
            has_video: false,
        };
        let combined = StreamSummary {
            has_audio: true,
            has_video: true,
        };

        assert_eq!(passthrough_format(audio_only, "m4a"), Some(AudioFormat::M4a));
        assert_eq!(passthrough_format(audio_only, "amr"), None);
        assert_eq!(passthrough_format(combined, "mp4"), None);
    }
}
