//! Photo records attached to inspection sections

use crate::data_uri::DataUri;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable photo identity, unique for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl<'de> Deserialize<'de> for PhotoId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Older snapshots stored numeric ids
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
            Missing,
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => PhotoId(text),
            RawId::Number(number) => PhotoId(number.to_string()),
            RawId::Missing => PhotoId::generate(),
        })
    }
}

impl PhotoId {
    /// Random v4 UUID; collision-resistant even inside a single batch
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PhotoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-local handle to preview bytes. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewHandle(u64);

impl PreviewHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One uploaded image attached to a section.
///
/// Serialized field names follow the stored snapshot format
/// (`id`, `name`, `dataUrl`, `size`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default = "PhotoId::generate")]
    pub id: PhotoId,

    /// Original file name, not necessarily unique
    #[serde(rename = "name", default, deserialize_with = "null_as_default")]
    pub display_name: String,

    /// Inline `data:image/...;base64,...` payload. Always authoritative.
    #[serde(rename = "dataUrl", default, deserialize_with = "null_as_default")]
    pub embedded_data: String,

    /// Fast preview handle; may be absent and is rebuilt from `embedded_data`
    #[serde(skip)]
    pub preview_handle: Option<PreviewHandle>,

    /// Size of the compressed image in bytes, informational only
    #[serde(rename = "size", default, deserialize_with = "null_as_default")]
    pub byte_size: u64,
}

/// `null` reads as the field's default so the record survives and repair
/// can judge it
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Photo {
    pub fn new(display_name: impl Into<String>, embedded_data: String, byte_size: u64) -> Self {
        Self {
            id: PhotoId::generate(),
            display_name: display_name.into(),
            embedded_data,
            preview_handle: None,
            byte_size,
        }
    }

    /// A photo is valid iff its embedded data self-describes an image type
    pub fn is_valid(&self) -> bool {
        DataUri::parse(&self.embedded_data).is_ok()
    }

    pub fn data_uri(&self) -> Option<DataUri<'_>> {
        DataUri::parse(&self.embedded_data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<PhotoId> =
            (0..64).map(|_| PhotoId::generate()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_validity_follows_embedded_data() {
        let photo = Photo::new("a.jpg", DataUri::encode(b"abc", "image/jpeg"), 3);
        assert!(photo.is_valid());

        let broken = Photo::new("b.jpg", "blob:http://localhost/1234".to_string(), 3);
        assert!(!broken.is_valid());

        let empty = Photo::new("c.jpg", String::new(), 0);
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_preview_handle_is_not_serialized() {
        let mut photo = Photo::new("a.jpg", DataUri::encode(b"abc", "image/png"), 3);
        photo.preview_handle = Some(PreviewHandle::from_raw(7));

        let json = serde_json::to_value(&photo).unwrap();
        assert!(json.get("preview_handle").is_none());
        assert_eq!(json["name"], "a.jpg");
        assert!(json["dataUrl"].as_str().unwrap().starts_with("data:image/png"));

        let back: Photo = serde_json::from_value(json).unwrap();
        assert_eq!(back.preview_handle, None);
        assert_eq!(back.id, photo.id);
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let photo: Photo =
            serde_json::from_str(r#"{"id":1712345678901.25,"name":"old.jpg"}"#).unwrap();
        assert_eq!(photo.id.as_str(), "1712345678901.25");
    }

    #[test]
    fn test_missing_data_url_deserializes_as_invalid() {
        let photo: Photo = serde_json::from_str(r#"{"id":"x","name":"lost.jpg"}"#).unwrap();
        assert_eq!(photo.id.as_str(), "x");
        assert!(!photo.is_valid());
    }

    #[test]
    fn test_null_fields_deserialize_as_invalid() {
        let photo: Photo = serde_json::from_str(
            r#"{"id":null,"name":null,"dataUrl":null,"size":null}"#,
        )
        .unwrap();
        assert!(!photo.id.as_str().is_empty());
        assert_eq!(photo.display_name, "");
        assert_eq!(photo.byte_size, 0);
        assert!(!photo.is_valid());
    }
}
