/// Media provider: resolves an item into details plus a variant catalog and
/// opens byte streams for a chosen variant.
///
/// The production provider runs `yt-dlp` as a subprocess. Its stderr is
/// forwarded to tracing under the `yt_dlp` target.
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use clipdrop_shared::errors::FetchError;
use clipdrop_shared::models::{MediaDetails, ResolvedItem, VariantDescriptor};

/// Byte stream of one variant, as produced by the provider.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Black-box source of variant catalogs and variant bytes.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Describe the item behind a canonical URL.
    async fn describe(&self, url: &str) -> Result<ResolvedItem, FetchError>;

    /// Open the byte stream of one variant.
    ///
    /// The stream must end with an error item if the provider fails midway.
    async fn open_stream(&self, url: &str, variant: &VariantDescriptor) -> Result<ByteStream, FetchError>;
}

/// Provider backed by the `yt-dlp` executable.
pub struct YtDlpProvider {
    bin: String,
    timeout: Duration,
}

impl YtDlpProvider {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    async fn describe(&self, url: &str) -> Result<ResolvedItem, FetchError> {
        debug!("Describing {} via {}", url, self.bin);

        let child = self
            .command()
            .args(["-J", "--no-playlist", "--no-warnings", url])
            .spawn()
            .map_err(|e| FetchError::resolution(format!("Failed to start {}: {}", self.bin, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FetchError::resolution(format!("Timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| FetchError::resolution(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!(target: "yt_dlp", "{}", line);
        }

        if !output.status.success() {
            let message = last_error_line(&stderr).unwrap_or_default();
            warn!("yt-dlp describe failed ({}): {}", output.status, message);
            return Err(FetchError::resolution(message));
        }

        let item = parse_info(&output.stdout)?;
        info!(
            "Resolved {} ({} variants)",
            item.details.item_id,
            item.variants.len()
        );
        Ok(item)
    }

    async fn open_stream(&self, url: &str, variant: &VariantDescriptor) -> Result<ByteStream, FetchError> {
        info!("Streaming variant {} of {}", variant.variant_id, url);

        let mut child = self
            .command()
            .args([
                "-f",
                variant.variant_id.as_str(),
                "-o",
                "-",
                "--no-part",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                url,
            ])
            .spawn()
            .map_err(|e| FetchError::transfer(format!("Failed to start {}: {}", self.bin, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::transfer("No stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::transfer("No stderr handle"))?;
        let stderr_task = tokio::spawn(forward_stderr(stderr));

        // Reported once stdout is drained: a failed exit becomes the stream's last item.
        let exit = futures::stream::once(async move {
            let status = child.wait().await;
            let last = stderr_task.await.ok().flatten();
            match status {
                Ok(s) if s.success() => None,
                Ok(s) => {
                    let reason = last.unwrap_or_else(|| format!("yt-dlp exited with {}", s));
                    warn!("Stream aborted: {}", reason);
                    Some(Err(io::Error::new(io::ErrorKind::Other, reason)))
                }
                Err(e) => Some(Err(e)),
            }
        })
        .filter_map(futures::future::ready);

        Ok(Box::pin(ReaderStream::new(stdout).chain(exit)))
    }
}

/// Forward stderr lines to tracing, returning the last error line seen.
async fn forward_stderr(stderr: ChildStderr) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last_error = None;
    let mut last_line = None;
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(target: "yt_dlp", "{}", line);
        if let Some(message) = line.strip_prefix("ERROR:") {
            last_error = Some(message.trim().to_string());
        }
        last_line = Some(line.to_string());
    }
    last_error.or(last_line)
}

/// Last `ERROR:` line, prefix stripped; otherwise the last non-empty line.
fn last_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:"))
        .or_else(|| lines.last().copied())
        .map(|l| l.trim().to_string())
}

// ====== yt-dlp JSON ======

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    thumbnail: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f64>,
    filesize: Option<u64>,
}

impl RawFormat {
    fn into_descriptor(self) -> VariantDescriptor {
        let has_video = self.vcodec.as_deref().map(|v| v != "none").unwrap_or(false);
        let has_audio = self.acodec.as_deref().map(|a| a != "none").unwrap_or(false);
        let container = self.ext.unwrap_or_default();
        let mime_type = derive_mime(has_video, has_audio, &container);

        VariantDescriptor {
            variant_id: self.format_id,
            has_video,
            has_audio,
            height: self.height,
            audio_bitrate: self.abr.map(|b| b.round() as u32),
            byte_length: self.filesize,
            mime_type,
            container,
        }
    }
}

fn derive_mime(has_video: bool, has_audio: bool, container: &str) -> Option<String> {
    if container.is_empty() {
        return None;
    }
    match (has_video, has_audio) {
        (true, _) => Some(format!("video/{}", container)),
        (false, true) if container == "m4a" => Some("audio/mp4".to_string()),
        (false, true) => Some(format!("audio/{}", container)),
        (false, false) => None,
    }
}

/// Parse `yt-dlp -J` output.
fn parse_info(stdout: &[u8]) -> Result<ResolvedItem, FetchError> {
    let raw: RawInfo = serde_json::from_slice(stdout)
        .map_err(|e| FetchError::resolution(format!("Unreadable provider output: {}", e)))?;

    let thumbnail_url = raw
        .thumbnails
        .last()
        .map(|t| t.url.clone())
        .or(raw.thumbnail)
        .unwrap_or_default();

    let details = MediaDetails {
        item_id: raw.id,
        title: raw.title,
        thumbnail_url,
        channel_name: raw.channel.or(raw.uploader).unwrap_or_default(),
        duration_secs: raw.duration.filter(|d| *d >= 0.0).map(|d| d as u64),
    };

    Ok(ResolvedItem {
        details,
        variants: raw.formats.into_iter().map(RawFormat::into_descriptor).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "abc123",
        "title": "A Video",
        "channel": "Some Channel",
        "duration": 212.0,
        "thumbnails": [{"url": "http://t/small.jpg"}, {"url": "http://t/large.jpg"}],
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "filesize": 3400000},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 135.1},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "filesize": null},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080}
        ]
    }"#;

    #[test]
    fn test_parse_info_details() {
        let item = parse_info(SAMPLE.as_bytes()).unwrap();
        assert_eq!(item.details.item_id, "abc123");
        assert_eq!(item.details.thumbnail_url, "http://t/large.jpg");
        assert_eq!(item.details.channel_name, "Some Channel");
        assert_eq!(item.details.duration_secs, Some(212));
        assert_eq!(item.variants.len(), 5);
    }

    #[test]
    fn test_parse_info_variants() {
        let item = parse_info(SAMPLE.as_bytes()).unwrap();
        let by_id = |id: &str| item.variants.iter().find(|v| v.variant_id == id).unwrap();

        let storyboard = by_id("sb0");
        assert!(!storyboard.has_video && !storyboard.has_audio);
        assert_eq!(storyboard.mime_type, None);

        let m4a = by_id("140");
        assert!(m4a.is_audio_only());
        assert_eq!(m4a.audio_bitrate, Some(130));
        assert_eq!(m4a.byte_length, Some(3_400_000));
        assert_eq!(m4a.mime_type.as_deref(), Some("audio/mp4"));

        let muxed = by_id("18");
        assert!(muxed.is_muxed());
        assert_eq!(muxed.height, Some(360));
        assert_eq!(muxed.byte_length, None);
        assert_eq!(muxed.mime_type.as_deref(), Some("video/mp4"));

        assert!(!by_id("137").has_audio);
    }

    #[test]
    fn test_parse_info_falls_back_to_uploader_and_thumbnail() {
        let json = r#"{"id":"x","title":"t","uploader":"Up","thumbnail":"http://t/only.jpg"}"#;
        let item = parse_info(json.as_bytes()).unwrap();
        assert_eq!(item.details.channel_name, "Up");
        assert_eq!(item.details.thumbnail_url, "http://t/only.jpg");
        assert_eq!(item.details.duration_secs, None);
        assert!(item.variants.is_empty());
    }

    #[test]
    fn test_parse_info_garbage() {
        let err = parse_info(b"not json").unwrap_err();
        assert!(matches!(err, FetchError::Resolution(_)));
    }

    #[test]
    fn test_last_error_line() {
        let stderr = "[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Video unavailable\n";
        assert_eq!(last_error_line(stderr).as_deref(), Some("[youtube] abc: Video unavailable"));
        assert_eq!(last_error_line("just noise\n").as_deref(), Some("just noise"));
        assert_eq!(last_error_line("  \n"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_resolution_failure() {
        let provider = YtDlpProvider::new("/nonexistent/clipdrop-yt-dlp", Duration::from_secs(5));
        let err = provider
            .describe("https://www.youtube.com/watch?v=abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Resolution(ref m) if m.contains("Failed to start")));
    }
}
