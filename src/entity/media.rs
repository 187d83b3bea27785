//! Media attachments

use crate::resource::registry::nested;
use crate::resource::{Entity, ResourceKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Gifv,
    Video,
    Audio,
    #[serde(other)]
    Unknown,
}

/// Dimensions of one rendition of an attachment (`original`, `small`...)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// `WIDTHxHEIGHT`
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub aspect: Option<f64>,
}

impl Entity for Metadata {
    const KIND: ResourceKind = ResourceKind::Metadata;
}

/// A file attached to a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub preview_remote_url: Option<String>,
    #[serde(default)]
    pub text_url: Option<String>,
    /// Renditions by name. Scalar entries (video `length`, `fps`...) and
    /// objects without dimensions (`focus`) are dropped.
    #[serde(
        default,
        serialize_with = "nested::map::serialize",
        deserialize_with = "renditions"
    )]
    pub meta: BTreeMap<String, Metadata>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub blurhash: Option<String>,
}

impl Entity for MediaAttachment {
    const KIND: ResourceKind = ResourceKind::MediaAttachment;
}

/// An object carrying at least one of `width`, `height` or `size`
fn is_rendition(value: &Value) -> bool {
    ["width", "height", "size"]
        .iter()
        .any(|field| value.get(field).is_some_and(|v| !v.is_null()))
}

fn renditions<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, Metadata>, D::Error> {
    let objects: serde_json::Map<String, Value> = Option::<BTreeMap<String, Value>>::deserialize(d)?
        .unwrap_or_default()
        .into_iter()
        .filter(|(_, value)| is_rendition(value))
        .collect();
    nested::map::deserialize::<Metadata, _>(Value::Object(objects)).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_meta_keeps_only_renditions() {
        let media = MediaAttachment::hydrate(json!({
            "id": "7",
            "type": "video",
            "url": "https://example.org/v.mp4",
            "meta": {
                "length": "0:00:25.03",
                "duration": 25.03,
                "fps": 30,
                "original": {"width": 640, "height": 360, "size": "640x360"},
                "small": {"width": 400, "height": 225, "aspect": 1.7777777777777777}
            }
        }))
        .unwrap();

        assert_eq!(media.media_type, MediaType::Video);
        assert_eq!(media.meta.len(), 2);
        assert_eq!(media.meta["original"].size.as_deref(), Some("640x360"));
        assert_eq!(media.meta["small"].width, Some(400));
    }

    #[test]
    fn test_focus_point_is_not_a_rendition() {
        let media = MediaAttachment::hydrate(json!({
            "id": "10",
            "type": "image",
            "url": "https://example.org/i.png",
            "meta": {
                "focus": {"x": -0.42, "y": 0.69},
                "original": {"width": 800, "height": 600},
                "small": {"size": "400x300"}
            }
        }))
        .unwrap();

        assert_eq!(media.meta.keys().collect::<Vec<_>>(), ["original", "small"]);
        let record = media.export().unwrap();
        assert!(record["meta"].get("focus").is_none());
    }

    #[test]
    fn test_unknown_media_type_and_null_meta() {
        let media = MediaAttachment::hydrate(json!({
            "id": "8",
            "type": "hologram",
            "url": "https://example.org/x",
            "meta": null
        }))
        .unwrap();
        assert_eq!(media.media_type, MediaType::Unknown);
        assert!(media.meta.is_empty());
    }

    #[test]
    fn test_export_tags_renditions() {
        let media = MediaAttachment::hydrate(json!({
            "id": "9",
            "type": "image",
            "url": "https://example.org/i.png",
            "meta": {"original": {"width": 1, "height": 1}}
        }))
        .unwrap();
        let record = media.export().unwrap();
        assert_eq!(record["kind"], "media_attachment");
        assert_eq!(record["type"], "image");
        assert_eq!(record["meta"]["original"]["kind"], "metadata");
        assert_eq!(MediaAttachment::from_record(record).unwrap(), media);
    }
}
