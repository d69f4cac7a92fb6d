/// Domain and wire models shared across all Clipdrop crates.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One encoded stream option as reported by the media provider.
///
/// Never mutated after the provider hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    pub variant_id: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub height: Option<u32>,
    pub container: String,
    pub audio_bitrate: Option<u32>,
    pub byte_length: Option<u64>,
    pub mime_type: Option<String>,
}

impl VariantDescriptor {
    /// Video and audio in one stream.
    pub fn is_muxed(&self) -> bool {
        self.has_video && self.has_audio
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    /// Mime type without codec parameters (`video/mp4; codecs=...` -> `video/mp4`).
    pub fn essence_mime(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .and_then(|m| m.split(';').next())
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// User-facing entry for one resolution tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    pub label: String,
    #[serde(rename = "value")]
    pub variant_id: String,
    pub height: u32,
    pub container: String,
}

impl QualityOption {
    /// Label shown in pickers; non-mp4 containers are called out.
    pub fn display_label(&self) -> String {
        if self.container == "mp4" {
            self.label.clone()
        } else {
            format!("{} ({})", self.label, self.container)
        }
    }
}

/// Descriptive metadata of an item as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDetails {
    pub item_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub duration_secs: Option<u64>,
}

/// Provider answer for one item: details plus the raw variant catalog.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub details: MediaDetails,
    pub variants: Vec<VariantDescriptor>,
}

/// Download format chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    #[default]
    Video,
    Audio,
}

impl DownloadFormat {
    pub fn as_str(&self) -> &str {
        match self {
            DownloadFormat::Video => "video",
            DownloadFormat::Audio => "audio",
        }
    }

    /// Capitalized form used in action labels.
    pub fn title(&self) -> &str {
        match self {
            DownloadFormat::Video => "Video",
            DownloadFormat::Audio => "Audio",
        }
    }
}

impl std::fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input to variant selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferRequest {
    pub item_id: String,
    pub explicit_variant_id: Option<String>,
    pub audio_only: bool,
}

/// Resolved item as held by the client for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItemInfo {
    pub item_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub duration_label: Option<String>,
    pub quality_options: Vec<QualityOption>,
    pub from_collection: bool,
    pub collection_id: Option<String>,
}

impl MediaItemInfo {
    /// Build from the `/api/video-info` answer, tagging the collection it came from.
    pub fn from_response(resp: VideoInfoResponse, collection_id: Option<String>) -> Self {
        Self {
            item_id: resp.video_id,
            title: resp.title,
            thumbnail_url: resp.thumbnail,
            channel_name: resp.channel,
            duration_label: resp.duration,
            quality_options: resp.qualities,
            from_collection: collection_id.is_some(),
            collection_id,
        }
    }
}

/// One completed transfer in the local history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub item_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub duration_label: Option<String>,
    pub format: DownloadFormat,
    pub completed_at: DateTime<Utc>,
}

// ====== WIRE TYPES ======

/// `GET /api/video-info` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfoResponse {
    pub title: String,
    pub thumbnail: String,
    pub duration: Option<String>,
    pub channel: String,
    pub video_id: String,
    #[serde(default)]
    pub qualities: Vec<QualityOption>,
}

/// `GET /api/playlist-info` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfoResponse {
    pub is_playlist: bool,
    pub playlist_id: String,
    pub message: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Format a duration as total minutes and zero-padded seconds (4503 -> "75:03").
pub fn duration_label(secs: Option<u64>) -> Option<String> {
    secs.map(|s| format!("{}:{:02}", s / 60, s % 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(Some(0)).as_deref(), Some("0:00"));
        assert_eq!(duration_label(Some(212)).as_deref(), Some("3:32"));
        assert_eq!(duration_label(Some(4503)).as_deref(), Some("75:03"));
        assert_eq!(duration_label(None), None);
    }

    #[test]
    fn test_essence_mime() {
        let mut v = VariantDescriptor {
            variant_id: "18".into(),
            has_video: true,
            has_audio: true,
            height: Some(360),
            container: "mp4".into(),
            audio_bitrate: None,
            byte_length: None,
            mime_type: Some("video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"".into()),
        };
        assert_eq!(v.essence_mime(), Some("video/mp4"));
        v.mime_type = None;
        assert_eq!(v.essence_mime(), None);
    }

    #[test]
    fn test_quality_option_wire_shape() {
        let q = QualityOption {
            label: "720p".into(),
            variant_id: "22".into(),
            height: 720,
            container: "webm".into(),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["value"], "22");
        assert_eq!(q.display_label(), "720p (webm)");
    }

    #[test]
    fn test_video_info_response_deserialization() {
        let json = r#"{"title":"T","thumbnail":"http://t/1.jpg","duration":"3:32","channel":"C","videoId":"abc123","qualities":[{"label":"360p","value":"18","height":360,"container":"mp4"}]}"#;
        let resp: VideoInfoResponse = serde_json::from_str(json).unwrap();
        let info = MediaItemInfo::from_response(resp, Some("PL1".into()));
        assert_eq!(info.item_id, "abc123");
        assert!(info.from_collection);
        assert_eq!(info.quality_options[0].variant_id, "18");
    }

    #[test]
    fn test_history_entry_serialization() {
        let entry = HistoryEntry {
            id: 1,
            item_id: "abc".into(),
            title: "T".into(),
            thumbnail_url: String::new(),
            channel_name: "C".into(),
            duration_label: None,
            format: DownloadFormat::Audio,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"itemId\":\"abc\""));
        assert!(json.contains("\"format\":\"audio\""));
    }
}
