//! Photo ingestion, persistence and report rendering for elevator inspections
//!
//! The pipeline for a photo is:
//! - [`normalize`]: decode, orient upright, downsample and re-encode
//! - [`asset`]: wrap the result in a [`Photo`](inspection_types::Photo) with
//!   an inline data URI and insert it into its section, capacity permitting
//! - [`persistence`]: snapshot the whole session to a [`store::SessionStore`]
//! - [`report`]: lay the form and photos out as a PDF
//!
//! [`InspectionSession`] owns the state and is the entry point for front ends.

pub mod asset;
pub mod autosave;
pub mod cancel;
pub mod config;
pub mod error;
pub mod normalize;
pub mod notify;
pub mod persistence;
pub mod preview;
pub mod registry;
pub mod report;
pub mod session;
pub mod store;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use asset::{AssetStore, InsertResult};
pub use cancel::CancelToken;
pub use config::{ConfigError, InspectionConfig, ReportConfig, SessionConfig, StoreConfig};
pub use error::{InspectionError, PersistError, RenderAssetError, Result};
pub use normalize::{normalize, Normalized, RawUpload};
pub use notify::{Notifier, Severity, TracingNotifier};
pub use persistence::{LoadState, Loaded, PersistenceManager};
pub use preview::PreviewStore;
pub use report::{RenderedReport, ReportRenderer};
pub use session::{InspectionSession, Restored, UploadReport};
pub use store::{FileStore, MemoryStore, SessionStore};
