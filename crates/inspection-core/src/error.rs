use inspection_types::DataUriError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Section {section} is full ({rejected} photo(s) rejected)")]
    CapacityExceeded { section: usize, rejected: usize },

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    RenderAsset(#[from] RenderAssetError),

    #[error("Invalid section index: {0}")]
    InvalidSection(usize),

    #[error("Not an image: {name} ({mime})")]
    NotAnImage { name: String, mime: String },

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Report generation failed: {0}")]
    Report(String),
}

/// Session store write/read failures
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A stored photo could not be turned back into page content
#[derive(Error, Debug)]
pub enum RenderAssetError {
    #[error("invalid embedded data: {0}")]
    InvalidData(#[from] DataUriError),

    #[error("unreadable image: {0}")]
    Unreadable(String),

    #[error("no supported format could embed the image")]
    NoFormat,
}

impl From<image::ImageError> for InspectionError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => InspectionError::Encode(e.to_string()),
            other => InspectionError::Decode(other.to_string()),
        }
    }
}

impl From<lopdf::Error> for InspectionError {
    fn from(err: lopdf::Error) -> Self {
        InspectionError::Report(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InspectionError>;
