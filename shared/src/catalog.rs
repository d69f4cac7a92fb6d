/// Variant catalog reduction: one quality option per resolution tier.
use std::collections::BTreeMap;

use crate::models::{QualityOption, VariantDescriptor};

/// Collapse a raw catalog into one muxed option per positive height.
///
/// Only variants carrying both audio and video take part. Within a height
/// the first variant seen wins unless a later one is mp4 and the current
/// pick is not. Output is sorted by height, highest first.
pub fn reduce_for_muxed(variants: &[VariantDescriptor]) -> Vec<QualityOption> {
    let mut by_height: BTreeMap<u32, &VariantDescriptor> = BTreeMap::new();

    for variant in variants.iter().filter(|v| v.is_muxed()) {
        let height = variant.height.unwrap_or(0);
        match by_height.get(&height) {
            Some(current) if current.container == "mp4" || variant.container != "mp4" => {}
            _ => {
                by_height.insert(height, variant);
            }
        }
    }

    by_height
        .into_iter()
        .rev()
        .filter(|(height, _)| *height > 0)
        .map(|(height, variant)| QualityOption {
            label: format!("{}p", height),
            variant_id: variant.variant_id.clone(),
            height,
            container: variant.container.clone(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::VariantDescriptor;

    pub fn muxed(id: &str, height: Option<u32>, container: &str) -> VariantDescriptor {
        VariantDescriptor {
            variant_id: id.to_string(),
            has_video: true,
            has_audio: true,
            height,
            container: container.to_string(),
            audio_bitrate: Some(96),
            byte_length: None,
            mime_type: Some(format!("video/{}", container)),
        }
    }

    pub fn video_only(id: &str, height: u32, container: &str) -> VariantDescriptor {
        VariantDescriptor {
            has_audio: false,
            audio_bitrate: None,
            ..muxed(id, Some(height), container)
        }
    }

    pub fn audio_only(id: &str, bitrate: Option<u32>, container: &str) -> VariantDescriptor {
        VariantDescriptor {
            variant_id: id.to_string(),
            has_video: false,
            has_audio: true,
            height: None,
            container: container.to_string(),
            audio_bitrate: bitrate,
            byte_length: None,
            mime_type: Some(format!("audio/{}; codecs=\"opus\"", container)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_tiers_sorted_with_mp4_preferred() {
        let catalog = vec![
            muxed("17", Some(144), "3gp"),
            muxed("43", Some(360), "webm"),
            muxed("18", Some(360), "mp4"),
            muxed("37", Some(1080), "mp4"),
        ];
        let options = reduce_for_muxed(&catalog);
        let labels: Vec<_> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["1080p", "360p", "144p"]);
        assert_eq!(options[1].variant_id, "18");
        assert_eq!(options[1].container, "mp4");
    }

    #[test]
    fn test_first_seen_wins_without_mp4() {
        let catalog = vec![
            muxed("a", Some(480), "webm"),
            muxed("b", Some(480), "3gp"),
        ];
        let options = reduce_for_muxed(&catalog);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].variant_id, "a");
    }

    #[test]
    fn test_first_mp4_is_kept() {
        let catalog = vec![
            muxed("a", Some(720), "mp4"),
            muxed("b", Some(720), "mp4"),
            muxed("c", Some(720), "webm"),
        ];
        let options = reduce_for_muxed(&catalog);
        assert_eq!(options[0].variant_id, "a");
    }

    #[test]
    fn test_unknown_height_and_non_muxed_excluded() {
        let catalog = vec![
            muxed("x", None, "mp4"),
            muxed("z", Some(0), "mp4"),
            video_only("137", 1080, "mp4"),
            audio_only("140", Some(128), "m4a"),
            muxed("18", Some(360), "mp4"),
        ];
        let options = reduce_for_muxed(&catalog);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].height, 360);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(reduce_for_muxed(&[]).is_empty());
    }
}
