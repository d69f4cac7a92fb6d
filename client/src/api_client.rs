/// HTTP client for the Clipdrop API.
///
/// Wraps the `/api/video-info` and `/api/download` endpoints. Non-success
/// answers are turned into [`FetchError`]s carrying the server's message.
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use clipdrop_shared::errors::{ClipdropError, ClipdropResult, FetchError};
use clipdrop_shared::models::{ErrorBody, MediaItemInfo, TransferRequest, VideoInfoResponse};

pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Client for the API at `base_url`, which must be an http(s) URL.
    pub fn new(base_url: impl Into<String>) -> ClipdropResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClipdropError::Config(format!(
                "API URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resolve `url` into display metadata and quality options.
    pub async fn video_info(&self, url: &str, collection_id: Option<String>) -> ClipdropResult<MediaItemInfo> {
        let response = self
            .http
            .get(self.endpoint("/api/video-info"))
            .query(&[("url", url)])
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(FetchError::resolution(message).into());
        }

        let body: VideoInfoResponse = response.json().await.map_err(http_error)?;
        debug!("Resolved {} with {} quality options", body.video_id, body.qualities.len());
        Ok(MediaItemInfo::from_response(body, collection_id))
    }

    /// Request a transfer. Returns once the server has answered with a success status.
    pub async fn open_download(&self, url: &str, request: &TransferRequest) -> ClipdropResult<Response> {
        let mut query = vec![("url", url.to_string())];
        if let Some(id) = &request.explicit_variant_id {
            query.push(("itag", id.clone()));
        }
        query.push(("audioOnly", request.audio_only.to_string()));

        let response = self
            .http
            .get(self.endpoint("/api/download"))
            .query(&query)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(FetchError::transfer(message).into());
        }
        Ok(response)
    }
}

/// Write an accepted download body into `dir`.
///
/// The file name comes from `Content-Disposition`; without one it falls back
/// to the sanitized title with an extension guessed from the request.
pub async fn save_download(
    response: Response,
    dir: &Path,
    title: &str,
    audio_only: bool,
) -> ClipdropResult<PathBuf> {
    let filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| fallback_filename(title, audio_only));
    let path = available_path(dir, &filename).await;
    persist_stream(response.bytes_stream(), &path).await
}

/// Stream a body into `path` through a `.part` sibling.
///
/// The final name only appears once every chunk is written. On failure the
/// partial file is removed.
pub async fn persist_stream<S, B, E>(body: S, path: &Path) -> ClipdropResult<PathBuf>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let partial = part_path(path);
    match write_chunks(body, &partial).await {
        Ok(written) => {
            tokio::fs::rename(&partial, path).await?;
            info!("Saved {} bytes to {}", written, path.display());
            Ok(path.to_path_buf())
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                warn!("Failed to remove {}: {}", partial.display(), rm);
            }
            Err(e)
        }
    }
}

async fn write_chunks<S, B, E>(body: S, partial: &Path) -> ClipdropResult<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(body);
    let mut file = tokio::fs::File::create(partial).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| FetchError::transfer(e.to_string()))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// `dir/filename`, or `dir/stem (n).ext` with the first free `n` when taken.
async fn available_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !exists(&candidate).await {
        return candidate;
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    let mut n = 1u32;
    loop {
        let name = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Extract the `filename` parameter of a Content-Disposition value.
///
/// Path separators are dropped so the name cannot escape the download directory.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name: String = raw
        .trim_matches('"')
        .chars()
        .filter(|c| !matches!(c, '/' | '\\'))
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name)
    }
}

/// File name used when the server did not name the attachment.
pub fn fallback_filename(title: &str, audio_only: bool) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let ext = if audio_only { "m4a" } else { "mp4" };
    format!("{}.{}", stem, ext)
}

/// Server-provided error message, empty when the body is not an error body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(e) => {
            debug!("Unreadable error body for status {}: {}", status, e);
            String::new()
        }
    }
}

fn http_error(e: reqwest::Error) -> ClipdropError {
    ClipdropError::Http(e.to_string())
}
