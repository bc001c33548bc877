use anyhow::Result;
use url::Url;

/// Validate a video reference URL and return the parsed form
pub fn parse_http_url(reference: &str) -> Result<Url> {
    let parsed = Url::parse(reference)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", reference))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}

/// Generate a collision-free filename for a per-request artifact
pub fn unique_filename(label: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let token = uuid::Uuid::new_v4();

    format!("{}_{}_{}.{}", label, timestamp, token, extension)
}

/// Last non-empty line of a subprocess stderr dump, for error messages
pub fn last_stderr_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output")
        .to_string()
}

/// Check if the current environment has the required external tools
pub async fn check_dependencies(yt_dlp: &str, ffmpeg: &str, ffprobe: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp).await {
        missing.push(format!("{} - required for media download", yt_dlp));
    }

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{} - required for audio extraction", ffmpeg));
    }

    if !check_command_available(ffprobe).await {
        missing.push(format!("{} - required for media probing", ffprobe));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://example.com/watch?v=abc").is_ok());
        assert!(parse_http_url("http://example.com").is_ok());
        assert!(parse_http_url("ftp://example.com").is_err());
        assert!(parse_http_url("not-a-url").is_err());
    }

    #[test]
    fn test_unique_filename_has_no_collisions() {
        let a = unique_filename("media", "mp4");
        let b = unique_filename("media", "mp4");
        assert_ne!(a, b);
        assert!(a.starts_with("media_"));
        assert!(a.ends_with(".mp4"));
    }

    #[test]
    fn test_last_stderr_line() {
        assert_eq!(last_stderr_line("a\nb\nc\n"), "c");
        assert_eq!(last_stderr_line("only"), "only");
        assert_eq!(last_stderr_line("line\n   \n"), "line");
        assert_eq!(last_stderr_line(""), "no error output");
    }
}
