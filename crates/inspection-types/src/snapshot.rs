//! Application snapshot as written to the session store
//!
//! JSON shape:
//!
//! ```json
//! {
//!   "formData": {"adresse": "...", "signature_client": true},
//!   "completedSections": [0, 1],
//!   "currentSection": 2,
//!   "sectionPhotos": {"0": [{"id": "...", "name": "...", "dataUrl": "...", "size": 1234}]},
//!   "lastSaved": "2024-05-01T10:00:00Z"
//! }
//! ```

use crate::form::FormData;
use crate::photo::{Photo, PhotoId};
use crate::sections::{PHOTO_SECTION_COUNT, SECTION_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Section index to ordered photo list. Insertion order is display order.
///
/// Serialized with string keys (`{"0": [...]}`). Unknown or out of range
/// keys found in stored data are dropped on read. Section values that are
/// not lists and list entries that are not photo records are discarded and
/// counted, see [`SectionPhotos::take_discarded`].
#[derive(Debug, Clone, Default)]
pub struct SectionPhotos {
    sections: BTreeMap<usize, Vec<Photo>>,
    discarded: usize,
}

impl PartialEq for SectionPhotos {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
    }
}

impl SectionPhotos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: usize) -> &[Photo] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, section: usize, photo: Photo) {
        self.sections.entry(section).or_default().push(photo);
    }

    pub fn extend<I>(&mut self, section: usize, photos: I)
    where
        I: IntoIterator<Item = Photo>,
    {
        let mut photos = photos.into_iter().peekable();
        if photos.peek().is_some() {
            self.sections.entry(section).or_default().extend(photos);
        }
    }

    /// Remove a photo by id, dropping the section entry once it is empty
    pub fn remove(&mut self, section: usize, id: &PhotoId) -> Option<Photo> {
        let photos = self.sections.get_mut(&section)?;
        let position = photos.iter().position(|p| &p.id == id)?;
        let removed = photos.remove(position);
        if photos.is_empty() {
            self.sections.remove(&section);
        }
        Some(removed)
    }

    pub fn count(&self, section: usize) -> usize {
        self.sections.get(&section).map(Vec::len).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn find(&self, section: usize, id: &PhotoId) -> Option<&Photo> {
        self.get(section).iter().find(|p| &p.id == id)
    }

    /// Sections that currently hold at least one photo, in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Photo])> {
        self.sections
            .iter()
            .filter(|(_, photos)| !photos.is_empty())
            .map(|(section, photos)| (*section, photos.as_slice()))
    }

    pub fn photos_mut(&mut self) -> impl Iterator<Item = &mut Photo> {
        self.sections.values_mut().flat_map(|photos| photos.iter_mut())
    }

    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Photo) -> bool,
    {
        let before = self.total();
        for photos in self.sections.values_mut() {
            photos.retain(|p| keep(p));
        }
        self.sections.retain(|_, photos| !photos.is_empty());
        before - self.total()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
        self.discarded = 0;
    }

    /// Malformed entries skipped while reading stored data, reset to zero
    pub fn take_discarded(&mut self) -> usize {
        std::mem::take(&mut self.discarded)
    }
}

impl Serialize for SectionPhotos {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            self.sections
                .iter()
                .filter(|(_, photos)| !photos.is_empty())
                .map(|(section, photos)| (section.to_string(), photos)),
        )
    }
}

impl<'de> Deserialize<'de> for SectionPhotos {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut photos = SectionPhotos::new();
        let entries = match Value::deserialize(deserializer)? {
            Value::Object(entries) => entries,
            Value::Null => return Ok(photos),
            other => {
                tracing::warn!(value = %other, "Section photos are not a map, discarding");
                photos.discarded += 1;
                return Ok(photos);
            }
        };

        for (key, value) in entries {
            let section = match key.parse::<usize>() {
                Ok(section) if section < PHOTO_SECTION_COUNT => section,
                _ => {
                    tracing::debug!(key = %key, "Dropping photos for unknown section");
                    continue;
                }
            };
            let Value::Array(items) = value else {
                tracing::warn!(section, "Section photos are not a list, discarding");
                photos.discarded += 1;
                continue;
            };
            for item in items {
                match serde_json::from_value::<Photo>(item) {
                    Ok(photo) => photos.push(section, photo),
                    Err(e) => {
                        tracing::warn!(section, error = %e, "Discarding malformed photo record");
                        photos.discarded += 1;
                    }
                }
            }
        }
        Ok(photos)
    }
}

/// The complete serializable state of one inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub form_data: FormData,

    #[serde(default, deserialize_with = "completed_in_range")]
    pub completed_sections: BTreeSet<usize>,

    #[serde(default, deserialize_with = "section_in_range")]
    pub current_section: usize,

    #[serde(default)]
    pub section_photos: SectionPhotos,

    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f64 {
        self.completed_sections.len() as f64 / SECTION_COUNT as f64
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn completed_in_range<'de, D>(deserializer: D) -> Result<BTreeSet<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<usize>::deserialize(deserializer)?;
    Ok(raw.into_iter().filter(|i| *i < SECTION_COUNT).collect())
}

fn section_in_range<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = usize::deserialize(deserializer)?;
    Ok(raw.min(SECTION_COUNT - 1))
}
