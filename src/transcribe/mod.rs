use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;

use crate::audio::AudioArtifact;
use crate::config::TranscriptionConfig;

/// Plain-text transcription output for one audio artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub text: String,
}

/// Failure kinds the transcription stage reports.
///
/// `Io` covers local faults outside this closed set (reading the audio
/// artifact); the pipeline maps it to an internal error.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("transcription service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("transcription service rejected the audio: {0}")]
    UnsupportedInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait for turning an audio artifact into transcript text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Upload `audio` and return the transcript
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<TranscriptResult, TranscribeError>;
}

/// Separate service rejections of our payload from service/auth/quota
/// faults, so the failure taxonomy stays faithful to where the fault
/// originated
fn classify_status(status: StatusCode, detail: &str) -> TranscribeError {
    let message = format!("HTTP {}: {}", status, detail.trim());

    match status.as_u16() {
        // Auth, quota, and server-side faults: the service, not our audio
        401 | 403 | 429 | 500..=599 => TranscribeError::ServiceUnavailable(message),
        400..=499 => TranscribeError::UnsupportedInput(message),
        _ => TranscribeError::ServiceUnavailable(message),
    }
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct WhisperClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    language: Option<String>,
}

impl WhisperClient {
    /// Build a client with the credential baked into its default headers.
    /// The configuration is read-only after this point.
    pub fn new(config: &TranscriptionConfig, api_key: &str) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| anyhow::anyhow!("Invalid credential value: {}", e))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/audio/transcriptions",
                config.api_base.trim_end_matches('/')
            ),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }

    fn build_form(&self, audio: &AudioArtifact, bytes: Vec<u8>) -> Result<Form, TranscribeError> {
        let part = Part::bytes(bytes)
            .file_name(format!("audio.{}", audio.format.as_str()))
            .mime_str(audio.format.mime_type())
            .map_err(|e| TranscribeError::UnsupportedInput(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("temperature", "0");

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        Ok(form)
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<TranscriptResult, TranscribeError> {
        let bytes = fs_err::read(&audio.path)?;

        tracing::debug!(
            bytes = bytes.len(),
            model = %self.model,
            "uploading audio for transcription"
        );

        let form = self.build_form(audio, bytes)?;

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TranscribeError::ServiceUnavailable(e.to_string()))?;

        // An empty transcript (e.g. a silent clip) is a valid success
        Ok(TranscriptResult {
            text: text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        let quota = classify_status(StatusCode::TOO_MANY_REQUESTS, "rate limited");
        assert!(matches!(quota, TranscribeError::ServiceUnavailable(_)));

        let auth = classify_status(StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(auth, TranscribeError::ServiceUnavailable(_)));

        let outage = classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(matches!(outage, TranscribeError::ServiceUnavailable(_)));

        let too_large = classify_status(StatusCode::PAYLOAD_TOO_LARGE, "26MB limit");
        assert!(matches!(too_large, TranscribeError::UnsupportedInput(_)));

        let malformed = classify_status(StatusCode::BAD_REQUEST, "invalid file");
        assert!(matches!(malformed, TranscribeError::UnsupportedInput(_)));
    }

    #[test]
    fn test_endpoint_built_from_api_base() {
        let config = TranscriptionConfig {
            api_base: "https://api.openai.com/v1/".to_string(),
            ..TranscriptionConfig::default()
        };
        let client = WhisperClient::new(&config, "sk-test").unwrap();
        assert_eq!(
            client.endpoint,
            "https://api.openai.com/v1/audio/transcriptions"
        );
    }
}
