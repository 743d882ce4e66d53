//! Repair and preview maintenance for the section photo registry

use crate::preview::PreviewStore;
use inspection_types::{Photo, PreviewHandle, SectionPhotos};

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub kept: SectionPhotos,
    pub dropped_count: usize,
}

/// Drop every photo whose embedded data is not a self-describing image.
///
/// Records already discarded while reading stored data count as dropped.
/// Idempotent: a registry that went through `repair` once comes back
/// unchanged with a drop count of zero.
pub fn repair(registry: SectionPhotos) -> Repaired {
    let mut kept = registry;
    let discarded = kept.take_discarded();
    let invalid = kept.retain(|photo| {
        let valid = photo.is_valid();
        if !valid {
            tracing::warn!(id = %photo.id, name = %photo.display_name, "Dropping photo without valid embedded data");
        }
        valid
    });
    Repaired {
        kept,
        dropped_count: discarded + invalid,
    }
}

/// Attach a preview handle to every photo that lacks a live one.
///
/// Failures leave the photo as is; it stays usable through its embedded data.
/// Returns the number of handles created.
pub fn ensure_preview_handles(registry: &mut SectionPhotos, previews: &PreviewStore) -> usize {
    let mut created = 0;
    for photo in registry.photos_mut() {
        let live = photo
            .preview_handle
            .map(|h| previews.resolve(h).is_some())
            .unwrap_or(false);
        if live {
            continue;
        }
        photo.preview_handle = preview_from_embedded(photo, previews);
        if photo.preview_handle.is_some() {
            created += 1;
        }
    }
    created
}

fn preview_from_embedded(photo: &Photo, previews: &PreviewStore) -> Option<PreviewHandle> {
    let uri = photo.data_uri()?;
    match uri.decode() {
        Ok(bytes) => previews.create(bytes, uri.mime()),
        Err(e) => {
            tracing::debug!(id = %photo.id, error = %e, "Preview rebuild failed");
            None
        }
    }
}
