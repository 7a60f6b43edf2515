//! Core data models used throughout tunewear.
//!
//! These types mirror the documents kept in the document store: catalog
//! items and their per-style counts, the per-user selection document, the
//! per-user mirrored samples, and the global music catalog.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Gender value used until the user picks one.
pub const GENDER_NONE: &str = "none";

/// A catalog entry stored at `image-data/cloth/{style}/{n}`.
///
/// The identifier is the document id; `img_url` is relative to the
/// style's folder in the object store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub web_url: String,
}

/// Per-style metadata document holding the largest valid identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyleCount {
    pub max_size: u32,
}

impl StyleCount {
    /// Decode a `count` document, rejecting a missing, non-integer, or
    /// non-positive `max_size`.
    pub fn from_document(style: &str, doc: &Value) -> Result<Self> {
        let raw = doc.get("max_size");
        let max_size = raw
            .and_then(Value::as_u64)
            .or_else(|| {
                // Integral floats are what some writers produce for counts.
                raw.and_then(Value::as_f64)
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .filter(|n| *n >= 1)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "invalid max_size for style '{}': {}",
                    style,
                    raw.map(Value::to_string)
                        .unwrap_or_else(|| "missing".to_string())
                ))
            })?;
        Ok(Self { max_size })
    }
}

/// A sampled catalog item together with its resolved download URL.
///
/// Pushed into the session's cloth results and written under
/// `prototype-data/{user}/{style}/{index}`. Also the element type of the
/// user's chosen garment list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredSample {
    pub img_id: String,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub web_url: String,
}

/// The per-user document written by a full save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSelection {
    #[serde(rename = "musicId")]
    pub music_ids: Vec<u32>,
    #[serde(rename = "styleTag")]
    pub style_tags: Vec<String>,
    pub gender: String,
    pub cloth: Vec<MirroredSample>,
}

/// The per-user document as read back from the store.
///
/// Every field is optional: an absent field leaves the session value
/// untouched, while a present field of the wrong type is rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StoredSelection {
    #[serde(rename = "musicId", default, deserialize_with = "number_or_string_list")]
    pub music_ids: Option<Vec<u32>>,
    #[serde(rename = "styleTag", default)]
    pub style_tags: Option<Vec<String>>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub cloth: Option<Vec<MirroredSample>>,
}

/// A song in the global `music-data` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicTrack {
    /// Position of the document in `music-data` (its document id).
    #[serde(skip)]
    pub index: usize,
    #[serde(deserialize_with = "number_or_string")]
    pub number: u32,
    pub title: String,
    pub singer: String,
    /// Resolved thumbnail URL.
    #[serde(default)]
    pub url: String,
}

/// Accept `7` as well as `"7"`; the seed tables are not consistent.
pub(crate) fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// [`number_or_string`] applied to every element of an optional list.
fn number_or_string_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Id(#[serde(deserialize_with = "number_or_string")] u32);

    let ids: Option<Vec<Id>> = Option::deserialize(deserializer)?;
    Ok(ids.map(|ids| ids.into_iter().map(|Id(n)| n).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn style_count_accepts_positive_integers() {
        let count = StyleCount::from_document("casual", &json!({ "max_size": 12 })).unwrap();
        assert_eq!(count.max_size, 12);

        let count = StyleCount::from_document("casual", &json!({ "max_size": 3.0 })).unwrap();
        assert_eq!(count.max_size, 3);
    }

    #[test]
    fn style_count_rejects_bad_values() {
        for doc in [
            json!({}),
            json!({ "max_size": 0 }),
            json!({ "max_size": -4 }),
            json!({ "max_size": 2.5 }),
            json!({ "max_size": "10" }),
        ] {
            let err = StyleCount::from_document("street", &doc).unwrap_err();
            assert!(matches!(err, Error::InvalidData(_)), "doc {doc} gave {err:?}");
        }
    }

    #[test]
    fn user_selection_uses_store_field_names() {
        let sel = UserSelection {
            music_ids: vec![3, 1],
            style_tags: vec!["casual".into()],
            gender: GENDER_NONE.into(),
            cloth: vec![],
        };
        let v = serde_json::to_value(&sel).unwrap();
        assert_eq!(
            v,
            json!({ "musicId": [3, 1], "styleTag": ["casual"], "gender": "none", "cloth": [] })
        );
    }

    #[test]
    fn stored_selection_rejects_wrong_shapes() {
        let bad = json!({ "musicId": "not-a-list" });
        assert!(serde_json::from_value::<StoredSelection>(bad).is_err());

        let partial: StoredSelection = serde_json::from_value(json!({ "gender": "f" })).unwrap();
        assert_eq!(partial.gender.as_deref(), Some("f"));
        assert!(partial.music_ids.is_none());
    }

    #[test]
    fn music_track_number_from_string() {
        let t: MusicTrack = serde_json::from_value(
            json!({ "number": "7", "title": "t", "singer": "s", "url": "u" }),
        )
        .unwrap();
        assert_eq!(t.number, 7);
    }
}
