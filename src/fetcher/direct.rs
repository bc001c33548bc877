use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::io::Write;
use std::path::Path;

use super::{FetchError, MediaArtifact, MediaFetcher};
use crate::pipeline::{ArtifactScope, VideoReference};

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "wav", "flac", "ogg", "opus", "aac", "mp4", "avi", "mov", "mkv", "webm", "m4v",
];

/// Fetcher for URLs that point straight at a media file
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Container extension, from the URL path first and the response
    /// content type as a fallback
    fn determine_container(&self, reference: &VideoReference, content_type: Option<&str>) -> String {
        if let Some(ext) = url_extension(reference) {
            return ext;
        }

        if let Some(content_type) = content_type {
            let mapped = match content_type {
                ct if ct.contains("mpeg") || ct.contains("mp3") => Some("mp3"),
                ct if ct.contains("mp4") || ct.contains("m4a") => Some("mp4"),
                ct if ct.contains("wav") => Some("wav"),
                ct if ct.contains("flac") => Some("flac"),
                ct if ct.contains("ogg") => Some("ogg"),
                ct if ct.contains("webm") => Some("webm"),
                _ => None,
            };
            if let Some(ext) = mapped {
                return ext.to_string();
            }
        }

        "mp4".to_string()
    }

    /// Probe the resource without downloading it
    async fn head(&self, reference: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .head(reference)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::Resolution(format!(
                "resource does not exist: HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "resource not accessible: HTTP {}",
                status
            )));
        }

        Ok(response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string()))
    }

    /// Stream the resource body into `target`
    async fn download(&self, reference: &str, target: &Path) -> Result<(), FetchError> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Transport(format!(
                "download failed: HTTP {}",
                response.status()
            )));
        }

        let mut file = fs_err::File::create(target)?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Transport(e.to_string()))?;
            file.write_all(&chunk)?;
        }

        Ok(())
    }
}

/// Extension of the last URL path segment when it is a known media type
fn url_extension(reference: &VideoReference) -> Option<String> {
    let parsed = url::Url::parse(reference.as_str()).ok()?;
    let filename = parsed.path_segments()?.last()?.to_string();
    let ext = Path::new(&filename).extension()?.to_str()?.to_lowercase();

    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Decoded filename for display purposes
fn display_name(reference: &VideoReference) -> Option<String> {
    let parsed = url::Url::parse(reference.as_str()).ok()?;
    let filename = parsed
        .path_segments()?
        .last()
        .filter(|name| !name.is_empty())?;

    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);

    Some(
        urlencoding::decode(stem)
            .unwrap_or_else(|_| stem.into())
            .replace(['_', '-'], " "),
    )
}

#[async_trait]
impl MediaFetcher for DirectFetcher {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn supports(&self, reference: &VideoReference) -> bool {
        url_extension(reference).is_some()
    }

    async fn fetch(
        &self,
        reference: &VideoReference,
        scope: &ArtifactScope,
    ) -> Result<MediaArtifact, FetchError> {
        let content_type = self.head(reference.as_str()).await?;
        let container = self.determine_container(reference, content_type.as_deref());

        let target = scope.allocate("media", &container);
        self.download(reference.as_str(), &target).await?;

        Ok(MediaArtifact {
            path: target,
            container,
            title: display_name(reference),
        })
    }
}

impl Default for DirectFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(raw: &str) -> VideoReference {
        VideoReference::parse(raw).unwrap()
    }

    #[test]
    fn test_supports_media_urls_only() {
        let fetcher = DirectFetcher::new();
        assert!(fetcher.supports(&reference("https://example.com/clip.mp4")));
        assert!(fetcher.supports(&reference("https://example.com/a/talk.MP3")));
        assert!(!fetcher.supports(&reference("https://example.com/watch?v=abc")));
        assert!(!fetcher.supports(&reference("https://example.com/page.html")));
    }

    #[test]
    fn test_determine_container_from_content_type() {
        let fetcher = DirectFetcher::new();
        let r = reference("https://example.com/stream");
        assert_eq!(fetcher.determine_container(&r, Some("audio/mpeg")), "mp3");
        assert_eq!(fetcher.determine_container(&r, Some("video/webm")), "webm");
        assert_eq!(fetcher.determine_container(&r, None), "mp4");
    }

    #[test]
    fn test_display_name_decodes_filename() {
        let name = display_name(&reference("https://example.com/My%20Great_talk.mp4"));
        assert_eq!(name.as_deref(), Some("My Great talk"));
    }
}
