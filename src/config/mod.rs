use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech-to-text service settings
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Service credential, taken from the environment at load time.
    /// Never read from or written to the config file.
    #[serde(skip)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model/engine selector sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Language hint (auto-detect if not specified)
    #[serde(default)]
    pub language: Option<String>,

    /// Upload request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Parent directory for per-request temporary files (system default if unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Path to the yt-dlp binary
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp_path: String,

    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// Path to the ffprobe binary
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "whisper-1".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_yt_dlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            language: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            yt_dlp_path: default_yt_dlp(),
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            transcription: TranscriptionConfig::default(),
            app: AppConfig::default(),
            api_key: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from file (defaults when absent) plus environment
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }

        config.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        Ok(config)
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("vidscribe").join("config.yaml"))
    }

    /// Credential check for the paths that actually talk to the service
    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY must be set in the environment");
        }
        Ok(&self.api_key)
    }

    /// Socket address to bind the HTTP listener to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  API Base: {}", self.transcription.api_base);
        println!("  Model: {}", self.transcription.model);
        if let Some(lang) = &self.transcription.language {
            println!("  Language: {}", lang);
        }
        println!(
            "  Credential: {}",
            if self.api_key.is_empty() {
                "not set"
            } else {
                "set"
            }
        );
        if let Some(dir) = &self.app.temp_dir {
            println!("  Temp Dir: {}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.transcription.model, "whisper-1");
        assert!(config.api_key.is_empty());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_bind_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 8080;
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8080");

        config.server.host = "not an address".to_string();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_yaml::from_str("server:\n  port: 9090\n").unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.transcription.api_base, "https://api.openai.com/v1");
        assert_eq!(config.app.yt_dlp_path, "yt-dlp");
    }
}
