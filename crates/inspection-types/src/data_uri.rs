//! Inline `data:` URIs carrying base64 image payloads
//!
//! A photo's durable representation is a data URI such as
//! `data:image/jpeg;base64,/9j/4AAQ...`. It carries its own MIME type and can
//! be decoded without any external fetch, which is what lets a report be
//! rendered long after the upload (or after a reload from the session store).

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    #[error("Missing data: scheme")]
    MissingScheme,

    #[error("Missing payload separator")]
    MissingSeparator,

    #[error("Not an image MIME type: {0}")]
    NotAnImage(String),

    #[error("Payload is not base64 encoded")]
    NotBase64,

    #[error("Empty payload")]
    EmptyPayload,

    #[error("Invalid base64 payload: {0}")]
    InvalidPayload(String),
}

/// Image formats the report renderer knows how to embed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageMime {
    /// Fixed order used when an embed attempt has to fall back to other formats
    pub const ALL: [ImageMime; 4] = [
        ImageMime::Png,
        ImageMime::Jpeg,
        ImageMime::Webp,
        ImageMime::Gif,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
            ImageMime::Gif => "image/gif",
        }
    }

    /// Parse a MIME type string. Accepts the common `image/jpg` alias.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageMime::Jpeg),
            "image/webp" => Some(ImageMime::Webp),
            "image/gif" => Some(ImageMime::Gif),
            _ => None,
        }
    }

    /// Guess from a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageMime::Png),
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(ImageMime::Jpeg),
            "webp" => Some(ImageMime::Webp),
            "gif" => Some(ImageMime::Gif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageMime::Png => "png",
            ImageMime::Jpeg => "jpg",
            ImageMime::Webp => "webp",
            ImageMime::Gif => "gif",
        }
    }

    /// Embed order starting with `self`, followed by the remaining formats
    /// in [`ImageMime::ALL`] order
    pub fn fallback_order(self) -> Vec<ImageMime> {
        let mut order = vec![self];
        order.extend(ImageMime::ALL.iter().copied().filter(|m| *m != self));
        order
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view over a parsed `data:image/...;base64,...` URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    mime: &'a str,
    payload: &'a str,
}

impl<'a> DataUri<'a> {
    /// Parse and validate the header of a data URI.
    ///
    /// Only the header is checked plus a non-empty payload; the payload is
    /// not decoded here so validation stays cheap on multi-megabyte strings.
    pub fn parse(input: &'a str) -> Result<Self, DataUriError> {
        let rest = input
            .strip_prefix(SCHEME)
            .ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or(DataUriError::MissingSeparator)?;

        let mime = header
            .strip_suffix(BASE64_MARKER)
            .ok_or(DataUriError::NotBase64)?;

        // Parameters such as `;charset=` may sit between the type and ;base64
        let mime = mime.split(';').next().unwrap_or_default().trim();
        let is_image = mime
            .strip_prefix("image/")
            .map(|subtype| !subtype.is_empty())
            .unwrap_or(false);
        if !is_image {
            return Err(DataUriError::NotAnImage(mime.to_string()));
        }

        if payload.trim().is_empty() {
            return Err(DataUriError::EmptyPayload);
        }

        Ok(Self { mime, payload })
    }

    /// Build a data URI string from raw bytes
    pub fn encode(bytes: &[u8], mime: &str) -> String {
        let encoded = STANDARD.encode(bytes);
        let mut out = String::with_capacity(SCHEME.len() + mime.len() + 8 + encoded.len());
        out.push_str(SCHEME);
        out.push_str(mime);
        out.push_str(BASE64_MARKER);
        out.push(',');
        out.push_str(&encoded);
        out
    }

    pub fn mime(&self) -> &'a str {
        self.mime
    }

    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Known embeddable format, if the MIME type is one of them
    pub fn image_mime(&self) -> Option<ImageMime> {
        ImageMime::from_mime(self.mime)
    }

    /// Decode the base64 payload back into bytes
    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        STANDARD
            .decode(self.payload.trim())
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))
    }
}
