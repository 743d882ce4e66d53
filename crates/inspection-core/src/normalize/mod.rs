//! Image normalization pipeline
//!
//! Each upload runs through `Decoding -> Orienting -> Compressing -> Done`
//! (or `Failed`). Decoding errors are fatal for that file. Encoding errors
//! fall back to passing the original bytes through untouched, so a photo the
//! user took is never lost just because it could not be recompressed.
//!
//! The CPU-heavy work runs on the blocking pool; [`normalize`] only awaits it.

pub mod budget;
pub mod orientation;

use crate::error::{InspectionError, Result};
use budget::Budget;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use inspection_types::ImageMime;
use orientation::Orientation;
use std::fmt;

/// A raw file as delivered by the upload collaborator
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub name: String,
    /// MIME type declared by the source, not sniffed from content
    pub declared_mime: String,
    pub bytes: Vec<u8>,
}

impl RawUpload {
    pub fn new(name: impl Into<String>, declared_mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_mime: declared_mime.into(),
            bytes,
        }
    }

    /// Reject empty and non-image files before any decode is attempted
    pub fn check(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(InspectionError::EmptyFile(self.name.clone()));
        }
        let is_image = self
            .declared_mime
            .trim()
            .to_ascii_lowercase()
            .strip_prefix("image/")
            .map(|sub| !sub.is_empty())
            .unwrap_or(false);
        if !is_image {
            return Err(InspectionError::NotAnImage {
                name: self.name.clone(),
                mime: self.declared_mime.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Orienting,
    Compressing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Decoding => "decoding",
            Stage::Orienting => "orienting",
            Stage::Compressing => "compressing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of normalizing one upload
#[derive(Debug, Clone)]
pub struct Normalized {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Quality of the encode that was kept; `None` for a pass-through
    pub quality: Option<f32>,
    pub original_size: u64,
}

impl Normalized {
    pub fn is_passthrough(&self) -> bool {
        self.quality.is_none()
    }
}

struct Tracker<'a> {
    name: &'a str,
    stage: Stage,
}

impl<'a> Tracker<'a> {
    fn new(name: &'a str) -> Self {
        tracing::debug!(file = %name, stage = %Stage::Decoding, "Normalizing photo");
        Self {
            name,
            stage: Stage::Decoding,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(file = %self.name, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// Normalize one upload on the blocking pool
pub async fn normalize(upload: RawUpload) -> Result<Normalized> {
    upload.check()?;
    let name = upload.name.clone();
    match tokio::task::spawn_blocking(move || normalize_bytes(&upload.name, &upload.bytes)).await
    {
        Ok(result) => result,
        Err(join_error) => {
            tracing::warn!(file = %name, error = %join_error, "Normalization task panicked");
            Err(InspectionError::Decode(format!(
                "normalization task failed: {}",
                join_error
            )))
        }
    }
}

/// Synchronous pipeline body
pub fn normalize_bytes(name: &str, bytes: &[u8]) -> Result<Normalized> {
    let mut tracker = Tracker::new(name);
    let original_size = bytes.len() as u64;

    let decoded = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracker.advance(Stage::Failed);
            return Err(InspectionError::Decode(format!("{}: {}", name, e)));
        }
    };
    let (src_w, src_h) = decoded.dimensions();
    if src_w == 0 || src_h == 0 {
        tracker.advance(Stage::Failed);
        return Err(InspectionError::Decode(format!("{}: empty image", name)));
    }

    tracker.advance(Stage::Orienting);
    let orientation = Orientation::read(bytes);
    let budget = Budget::for_image(original_size, src_w, src_h);
    let (w, h) = budget::fit_within(src_w, src_h, budget.max_edge);
    let scaled = if (w, h) == (src_w, src_h) {
        decoded
    } else {
        decoded.resize_exact(w, h, FilterType::Triangle)
    };
    let upright = orientation.apply(scaled);
    tracing::debug!(
        file = %name,
        ?orientation,
        src = %format!("{}x{}", src_w, src_h),
        out = %format!("{}x{}", upright.width(), upright.height()),
        "Scaled to budget"
    );

    tracker.advance(Stage::Compressing);
    let first = match encode_jpeg(&upright, budget.quality) {
        Ok(buf) => buf,
        Err(e) => {
            tracing::warn!(file = %name, error = %e, "Compression failed, keeping original bytes");
            tracker.advance(Stage::Done);
            return Ok(passthrough(bytes, src_w, src_h));
        }
    };

    let mut kept = (first, budget.quality);
    if budget::needs_second_pass(kept.0.len() as u64, original_size) {
        let retry_quality = budget::reduced_quality(budget.quality);
        match encode_jpeg(&upright, retry_quality) {
            Ok(buf) => {
                tracing::debug!(
                    file = %name,
                    first = kept.0.len(),
                    second = buf.len(),
                    quality = retry_quality,
                    "Second compression pass"
                );
                kept = (buf, retry_quality);
            }
            Err(e) => {
                tracing::debug!(file = %name, error = %e, "Second pass failed, keeping first");
            }
        }
    }

    tracker.advance(Stage::Done);
    let (bytes, quality) = kept;
    Ok(Normalized {
        bytes,
        mime: ImageMime::Jpeg.as_str().to_string(),
        width: upright.width(),
        height: upright.height(),
        quality: Some(quality),
        original_size,
    })
}

fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, budget::jpeg_quality(quality))
        .encode_image(&rgb)
        .map_err(|e| InspectionError::Encode(e.to_string()))?;
    if buf.is_empty() {
        return Err(InspectionError::Encode("encoder produced no output".into()));
    }
    Ok(buf)
}

fn passthrough(bytes: &[u8], width: u32, height: u32) -> Normalized {
    let mime = image::guess_format(bytes)
        .ok()
        .and_then(|f| ImageMime::from_mime(f.to_mime_type()))
        .unwrap_or(ImageMime::Jpeg);
    Normalized {
        bytes: bytes.to_vec(),
        mime: mime.as_str().to_string(),
        width,
        height,
        quality: None,
        original_size: bytes.len() as u64,
    }
}
