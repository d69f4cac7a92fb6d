/// Transfer orchestration: frames a selected variant as an HTTP attachment
/// and streams the provider's bytes through without buffering.
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tracing::{info, warn};

use clipdrop_shared::errors::FetchError;
use clipdrop_shared::selector::Selection;

use crate::provider::{ByteStream, MediaProvider};

/// Transport metadata for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMeta {
    pub content_type: String,
    pub filename: String,
    pub content_length: Option<u64>,
}

impl TransferMeta {
    pub fn new(selection: &Selection, title: &str) -> Self {
        Self {
            content_type: selection.mime_type.clone(),
            filename: format!("{}.{}", sanitize_title(title), selection.extension),
            content_length: selection.variant.byte_length,
        }
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// An established transfer: headers decided, bytes pending.
pub struct Transfer {
    pub meta: TransferMeta,
    body: ByteStream,
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Open the provider stream for a selection.
///
/// Waits for the first chunk so a provider that fails before producing any
/// byte is reported as `Transfer` while the response can still carry an
/// error status. Later failures stay in the stream and abort the body.
pub async fn begin_transfer(
    provider: &dyn MediaProvider,
    url: &str,
    selection: &Selection,
    title: &str,
) -> Result<Transfer, FetchError> {
    let meta = TransferMeta::new(selection, title);
    let mut stream = provider.open_stream(url, &selection.variant).await?;

    let body: ByteStream = match stream.next().await {
        Some(Ok(first)) => Box::pin(futures::stream::once(futures::future::ready(Ok(first))).chain(stream)),
        Some(Err(e)) => {
            warn!("Transfer of {} failed before first byte: {}", selection.variant.variant_id, e);
            return Err(FetchError::transfer(e.to_string()));
        }
        None => Box::pin(futures::stream::empty()),
    };

    info!(
        "Transfer started: variant={} file={} length={:?}",
        selection.variant.variant_id, meta.filename, meta.content_length
    );
    Ok(Transfer { meta, body })
}

impl IntoResponse for Transfer {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Body::from_stream(self.body)).into_response();
        let headers = response.headers_mut();

        let content_type = HeaderValue::from_str(&self.meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        headers.insert(header::CONTENT_TYPE, content_type);

        // Sanitized filenames are plain ASCII, so this only fails on an odd extension.
        if let Ok(disposition) = HeaderValue::from_str(&self.meta.content_disposition()) {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
        if let Some(len) = self.meta.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        response
    }
}
