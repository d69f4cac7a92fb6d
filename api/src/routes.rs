/// API route handlers for Clipdrop.
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use clipdrop_shared::catalog::reduce_for_muxed;
use clipdrop_shared::errors::FetchError;
use clipdrop_shared::locator::{self, Locator};
use clipdrop_shared::models::{
    duration_label, ErrorBody, PlaylistInfoResponse, TransferRequest, VideoInfoResponse,
};
use clipdrop_shared::selector;

use crate::transfer;
use crate::AppState;

// ====== REQUEST TYPES ======

#[derive(Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub itag: Option<String>,
    #[serde(rename = "audioOnly")]
    pub audio_only: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

fn fetch_error(err: FetchError) -> ApiError {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error(status, err.to_string())
}

/// Non-empty `url` parameter.
fn required_url(url: Option<String>) -> Result<String, ApiError> {
    url.map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "URL is required"))
}

/// Resolvable locator from the `url` parameter.
fn required_locator(url: Option<String>) -> Result<(Locator, String), ApiError> {
    let url = required_url(url)?;
    let locator = locator::classify_resolvable(&url).map_err(fetch_error)?;
    let canonical = locator
        .canonical_url()
        .ok_or_else(|| fetch_error(FetchError::CollectionOnlyLocator))?;
    Ok((locator, canonical))
}

/// Routes served under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/video-info", get(video_info))
        .route("/api/download", get(download))
        .route("/api/playlist-info", get(playlist_info))
        .with_state(state)
}

// ====== VIDEO INFO ======

/// GET /api/video-info?url=
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<VideoInfoResponse>, ApiError> {
    let (_, canonical) = required_locator(query.url)?;

    let item = state.provider.describe(&canonical).await.map_err(|e| {
        warn!("Error fetching video info for {}: {}", canonical, e);
        fetch_error(e)
    })?;

    let qualities = reduce_for_muxed(&item.variants);
    info!(
        "Video info: id={} qualities={}",
        item.details.item_id,
        qualities.len()
    );

    Ok(Json(VideoInfoResponse {
        title: item.details.title,
        thumbnail: item.details.thumbnail_url,
        duration: duration_label(item.details.duration_secs),
        channel: item.details.channel_name,
        video_id: item.details.item_id,
        qualities,
    }))
}

// ====== DOWNLOAD ======

/// GET /api/download?url=&itag=&audioOnly=
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let (locator, canonical) = required_locator(query.url)?;

    let item = state.provider.describe(&canonical).await.map_err(|e| {
        warn!("Error resolving {} for download: {}", canonical, e);
        fetch_error(e)
    })?;

    let request = TransferRequest {
        item_id: locator.require_item().map_err(fetch_error)?.to_string(),
        explicit_variant_id: query.itag.filter(|i| !i.trim().is_empty()),
        audio_only: query.audio_only.as_deref() == Some("true"),
    };

    let selection = selector::select(&request, &item.variants).map_err(|e| {
        warn!("No variant for {:?}: {}", request, e);
        fetch_error(e)
    })?;
    info!(
        "Selected variant {} ({:?}) for {}",
        selection.variant.variant_id, selection.step, request.item_id
    );

    let transfer = transfer::begin_transfer(
        state.provider.as_ref(),
        &canonical,
        &selection,
        &item.details.title,
    )
    .await
    .map_err(|e| {
        warn!("Error downloading {}: {}", canonical, e);
        fetch_error(e)
    })?;

    Ok(transfer.into_response())
}

// ====== PLAYLIST INFO ======

/// GET /api/playlist-info?url=
///
/// Advisory only: reports the collection id, never its members.
pub async fn playlist_info(
    Query(query): Query<UrlQuery>,
) -> Result<Json<PlaylistInfoResponse>, ApiError> {
    let url = required_url(query.url)?;
    let playlist_id = locator::extract_collection_id(&url)
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "No playlist ID found in URL"))?;

    Ok(Json(PlaylistInfoResponse {
        is_playlist: true,
        playlist_id,
        message: "Playlist detected. For individual videos, remove the list parameter from the URL."
            .to_string(),
    }))
}
