//! Photo records from normalized buffers, and bounded insertion into sections

use crate::error::{InspectionError, Result};
use crate::preview::PreviewStore;
use inspection_types::{
    DataUri, Photo, PhotoId, SectionPhotos, MAX_PHOTOS_PER_SECTION, PHOTO_SECTION_COUNT,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub accepted: Vec<Photo>,
    pub rejected_count: usize,
}

impl InsertResult {
    /// The capacity error covering the rejected subset, if any
    pub fn overflow(&self, section: usize) -> Option<InspectionError> {
        (self.rejected_count > 0).then_some(InspectionError::CapacityExceeded {
            section,
            rejected: self.rejected_count,
        })
    }
}

/// Builds photos and moves them in and out of a [`SectionPhotos`] registry.
///
/// Owns the preview handle lifecycle: a handle created here is released
/// either when its photo is rejected, removed, or the whole store is reset.
#[derive(Debug, Clone)]
pub struct AssetStore {
    previews: Arc<PreviewStore>,
}

impl AssetStore {
    pub fn new(previews: Arc<PreviewStore>) -> Self {
        Self { previews }
    }

    pub fn previews(&self) -> &Arc<PreviewStore> {
        &self.previews
    }

    /// Wrap an encoded image into a photo with an inline data URI.
    ///
    /// A preview handle is attached when one can be created; its absence is
    /// not an error.
    pub fn to_photo(&self, buffer: &[u8], mime: &str, display_name: &str) -> Result<Photo> {
        if buffer.is_empty() {
            return Err(InspectionError::Encode(format!(
                "{}: empty image buffer",
                display_name
            )));
        }
        let embedded = DataUri::encode(buffer, mime);
        let mut photo = Photo::new(display_name, embedded, buffer.len() as u64);
        photo.preview_handle = self.previews.create(buffer.to_vec(), mime);
        if photo.preview_handle.is_none() {
            tracing::debug!(file = %display_name, "No preview handle, embedded data will be used");
        }
        Ok(photo)
    }

    /// Append `photos` to `section`, in order, up to the remaining capacity.
    ///
    /// Photos past the capacity are dropped whole and their preview handles
    /// released. Callers must hold the section's insertion lock so the
    /// capacity read and the append happen without interleaving.
    pub fn insert(
        &self,
        registry: &mut SectionPhotos,
        section: usize,
        photos: Vec<Photo>,
    ) -> Result<InsertResult> {
        if section >= PHOTO_SECTION_COUNT {
            for photo in &photos {
                self.release(photo);
            }
            return Err(InspectionError::InvalidSection(section));
        }

        let room = MAX_PHOTOS_PER_SECTION.saturating_sub(registry.count(section));
        let mut photos = photos;
        let overflow = if photos.len() > room {
            photos.split_off(room)
        } else {
            Vec::new()
        };
        for photo in &overflow {
            self.release(photo);
        }

        registry.extend(section, photos.iter().cloned());
        if !overflow.is_empty() {
            tracing::info!(
                section,
                accepted = photos.len(),
                rejected = overflow.len(),
                "Section photo capacity reached"
            );
        }

        Ok(InsertResult {
            accepted: photos,
            rejected_count: overflow.len(),
        })
    }

    /// Remove a photo by id. Returns false when no such photo exists.
    pub fn remove(&self, registry: &mut SectionPhotos, section: usize, id: &PhotoId) -> bool {
        if section >= PHOTO_SECTION_COUNT {
            return false;
        }
        let Some(removed) = registry.remove(section, id) else {
            return false;
        };
        self.release(&removed);
        tracing::debug!(section, id = %removed.id, "Photo removed");
        true
    }

    /// Release every preview handle held by the registry's photos
    pub fn release_all(&self, registry: &mut SectionPhotos) {
        for photo in registry.photos_mut() {
            if let Some(handle) = photo.preview_handle.take() {
                self.previews.release(handle);
            }
        }
        // Handles orphaned by earlier failures
        self.previews.release_all();
    }

    fn release(&self, photo: &Photo) {
        if let Some(handle) = photo.preview_handle {
            self.previews.release(handle);
        }
    }
}
