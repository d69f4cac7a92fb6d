/// Variant selection with a fixed fallback chain.
use std::cmp::Reverse;

use crate::errors::FetchError;
use crate::models::{TransferRequest, VariantDescriptor};

/// Which rung of the fallback chain produced the pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStep {
    AudioOnly,
    Explicit,
    MuxedMp4,
    MuxedAny,
}

/// A transferable variant plus the framing decided for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub variant: VariantDescriptor,
    pub extension: String,
    pub mime_type: String,
    pub step: SelectionStep,
}

/// Pick exactly one variant for the request.
///
/// Chain, first match wins:
/// 1. audio-only requested: best audio-only variant by bitrate
/// 2. explicit variant id (ignored when audio-only is requested)
/// 3. highest muxed mp4
/// 4. highest muxed variant of any container
pub fn select(request: &TransferRequest, catalog: &[VariantDescriptor]) -> Result<Selection, FetchError> {
    if request.audio_only {
        if let Some(variant) = best_by(catalog.iter().filter(|v| v.is_audio_only()), |v| {
            v.audio_bitrate.unwrap_or(0)
        }) {
            // Bytes are unchanged; only the advertised extension is normalized.
            let extension = if variant.container == "webm" { "webm" } else { "m4a" };
            return Ok(Selection {
                extension: extension.to_string(),
                mime_type: variant.essence_mime().unwrap_or("audio/mp4").to_string(),
                variant: variant.clone(),
                step: SelectionStep::AudioOnly,
            });
        }
    } else if let Some(wanted) = request.explicit_variant_id.as_deref().filter(|id| !id.is_empty()) {
        if let Some(variant) = catalog.iter().find(|v| v.variant_id == wanted) {
            return Ok(Selection {
                extension: container_or_mp4(variant),
                mime_type: variant.essence_mime().unwrap_or("video/mp4").to_string(),
                variant: variant.clone(),
                step: SelectionStep::Explicit,
            });
        }
    }

    let mp4 = catalog.iter().filter(|v| v.is_muxed() && v.container == "mp4");
    if let Some(variant) = best_by(mp4, |v| v.height.unwrap_or(0)) {
        return Ok(Selection {
            extension: "mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            variant: variant.clone(),
            step: SelectionStep::MuxedMp4,
        });
    }

    let muxed = catalog.iter().filter(|v| v.is_muxed());
    if let Some(variant) = best_by(muxed, |v| v.height.unwrap_or(0)) {
        return Ok(Selection {
            extension: container_or_mp4(variant),
            mime_type: variant.essence_mime().unwrap_or("video/mp4").to_string(),
            variant: variant.clone(),
            step: SelectionStep::MuxedAny,
        });
    }

    Err(FetchError::NoSuitableVariant)
}

/// Highest key wins; ties go to the variant listed first.
fn best_by<'a, I, F>(candidates: I, key: F) -> Option<&'a VariantDescriptor>
where
    I: Iterator<Item = &'a VariantDescriptor>,
    F: Fn(&VariantDescriptor) -> u32,
{
    candidates.min_by_key(|v| Reverse(key(*v)))
}

fn container_or_mp4(variant: &VariantDescriptor) -> String {
    if variant.container.is_empty() {
        "mp4".to_string()
    } else {
        variant.container.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::*;

    fn request(explicit: Option<&str>, audio_only: bool) -> TransferRequest {
        TransferRequest {
            item_id: "abc123".into(),
            explicit_variant_id: explicit.map(String::from),
            audio_only,
        }
    }

    #[test]
    fn test_audio_only_webm_keeps_extension() {
        let catalog = vec![muxed("18", Some(360), "mp4"), audio_only("251", Some(128), "webm")];
        let sel = select(&request(None, true), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "251");
        assert_eq!(sel.extension, "webm");
        assert_eq!(sel.mime_type, "audio/webm");
        assert_eq!(sel.step, SelectionStep::AudioOnly);
    }

    #[test]
    fn test_audio_only_prefers_bitrate_and_normalizes_to_m4a() {
        let catalog = vec![
            audio_only("139", Some(48), "m4a"),
            audio_only("140", Some(129), "mp4"),
            audio_only("x", None, "webm"),
        ];
        let sel = select(&request(Some("139"), true), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "140");
        assert_eq!(sel.extension, "m4a");
    }

    #[test]
    fn test_audio_only_bitrate_tie_keeps_first() {
        let catalog = vec![audio_only("a", Some(128), "m4a"), audio_only("b", Some(128), "webm")];
        let sel = select(&request(None, true), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "a");
    }

    #[test]
    fn test_audio_only_without_audio_falls_back_to_muxed() {
        let catalog = vec![muxed("18", Some(360), "mp4")];
        let sel = select(&request(None, true), &catalog).unwrap();
        assert_eq!(sel.step, SelectionStep::MuxedMp4);
    }

    #[test]
    fn test_explicit_variant() {
        let catalog = vec![muxed("18", Some(360), "mp4"), muxed("43", Some(360), "webm")];
        let sel = select(&request(Some("43"), false), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "43");
        assert_eq!(sel.extension, "webm");
        assert_eq!(sel.mime_type, "video/webm");
        assert_eq!(sel.step, SelectionStep::Explicit);
    }

    #[test]
    fn test_explicit_missing_falls_to_mp4() {
        let catalog = vec![
            muxed("a", Some(480), "mp4"),
            muxed("b", Some(720), "mp4"),
            muxed("c", Some(1080), "webm"),
        ];
        let sel = select(&request(Some("22"), false), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "b");
        assert_eq!(sel.variant.height, Some(720));
        assert_eq!(sel.extension, "mp4");
        assert_eq!(sel.mime_type, "video/mp4");
        assert_eq!(sel.step, SelectionStep::MuxedMp4);
    }

    #[test]
    fn test_empty_explicit_id_is_ignored() {
        let catalog = vec![muxed("18", Some(360), "mp4")];
        let sel = select(&request(Some(""), false), &catalog).unwrap();
        assert_eq!(sel.step, SelectionStep::MuxedMp4);
    }

    #[test]
    fn test_any_container_fallback() {
        let catalog = vec![
            muxed("a", Some(240), "webm"),
            muxed("b", None, "3gp"),
            muxed("c", Some(480), "webm"),
        ];
        let sel = select(&request(None, false), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "c");
        assert_eq!(sel.extension, "webm");
        assert_eq!(sel.step, SelectionStep::MuxedAny);
    }

    #[test]
    fn test_not_found() {
        let catalog = vec![video_only("137", 1080, "mp4"), audio_only("140", Some(128), "m4a")];
        assert_eq!(
            select(&request(Some("22"), false), &catalog),
            Err(FetchError::NoSuitableVariant)
        );
        assert_eq!(select(&request(None, false), &[]), Err(FetchError::NoSuitableVariant));
    }

    #[test]
    fn test_explicit_non_muxed_variant_is_honored() {
        let catalog = vec![video_only("137", 1080, "mp4"), muxed("18", Some(360), "mp4")];
        let sel = select(&request(Some("137"), false), &catalog).unwrap();
        assert_eq!(sel.variant.variant_id, "137");
    }
}
