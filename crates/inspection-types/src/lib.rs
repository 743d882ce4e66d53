//! Data model for elevator inspection visits
//!
//! Everything in this crate is plain data: the fixed section catalog, form
//! values, photo records with their inline image payload, and the snapshot
//! that gets written to the session store.

pub mod data_uri;
pub mod form;
pub mod photo;
pub mod sections;
pub mod snapshot;

pub use data_uri::{DataUri, DataUriError, ImageMime};
pub use form::{FieldValue, FormData};
pub use photo::{Photo, PhotoId, PreviewHandle};
pub use sections::{label_for, section, Field, Section, PHOTO_SECTION_COUNT, SECTIONS, SECTION_COUNT};
pub use snapshot::{SectionPhotos, Snapshot};

/// Maximum number of photos a single section may hold
pub const MAX_PHOTOS_PER_SECTION: usize = 6;
