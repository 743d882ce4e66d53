//! Test-only helpers: synthetic images, a recording notifier and read access
//! to session internals. Compiled for unit tests and behind the
//! `test-utils` feature; not part of the production interface.

use crate::notify::{Notifier, Severity};
use crate::preview::PreviewStore;
use crate::session::InspectionSession;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use inspection_types::Snapshot;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&gradient(width, height))
        .unwrap();
    out
}

/// Deterministic per-pixel noise; barely compressible
pub fn noise_jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    let noise = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&noise)
        .unwrap();
    out
}

/// Insert an APP1 segment carrying only an orientation tag right after SOI
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    tiff.extend_from_slice(&[0x00, 0x01]);
    tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0x00, 0x00]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut app1 = b"Exif\x00\x00".to_vec();
    app1.extend_from_slice(&tiff);
    let len = (app1.len() + 2) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + app1.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Grow a JPEG to at least `target_len` bytes with comment segments.
/// Decoders skip them, so pixels are unchanged while the byte size tier moves.
pub fn pad_jpeg(jpeg: &[u8], target_len: usize) -> Vec<u8> {
    const CHUNK: usize = 65_533;
    let mut out = jpeg[..2].to_vec();
    let mut padded = jpeg.len();
    while padded < target_len {
        out.extend_from_slice(&[0xFF, 0xFE]);
        out.extend_from_slice(&((CHUNK + 2) as u16).to_be_bytes());
        out.extend(std::iter::repeat(b'#').take(CHUNK));
        padded += CHUNK + 4;
    }
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Records every notification for later assertions
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl CollectingNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages()
            .iter()
            .filter(|(_, s)| *s == severity)
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|(m, _)| m.contains(needle))
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((message.to_string(), severity));
        }
    }
}

/// Read-only window into a session
pub async fn snapshot_of(session: &InspectionSession) -> Snapshot {
    session.state().lock().await.clone()
}

pub fn previews_of(session: &InspectionSession) -> Arc<PreviewStore> {
    Arc::clone(session.assets().previews())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::orientation::Orientation;

    #[test]
    fn test_exif_helper_is_readable() {
        let jpeg = with_exif_orientation(&jpeg_bytes(8, 4, 80), 6);
        assert_eq!(Orientation::read(&jpeg), Orientation::Rotate90);
        assert!(image::load_from_memory(&jpeg).is_ok());
    }

    #[test]
    fn test_padding_keeps_image_decodable() {
        let jpeg = jpeg_bytes(16, 16, 80);
        let padded = pad_jpeg(&jpeg, 200_000);
        assert!(padded.len() >= 200_000);
        let img = image::load_from_memory(&padded).unwrap();
        assert_eq!((img.width(), img.height()), (16, 16));
    }
}
