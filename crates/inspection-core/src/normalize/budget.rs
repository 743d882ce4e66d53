//! Size and quality budget for normalized photos
//!
//! Both the target edge length and the JPEG quality are chosen from the
//! original file's byte size; the pixel count can only tighten the edge.

const MB: u64 = 1024 * 1024;
const MEGAPIXEL: u64 = 1_000_000;

/// Outputs above this size are candidates for a second, lower quality pass
pub const REENCODE_MIN_BYTES: u64 = 500 * 1024;
/// ...when they are also above this fraction of the original size
pub const REENCODE_RATIO: f64 = 0.7;

const QUALITY_STEP: f32 = 0.2;
const QUALITY_FLOOR: f32 = 0.3;

/// Byte-size tiers, largest first: (threshold, max edge, quality)
const SIZE_TIERS: [(u64, u32, f32); 4] = [
    (10 * MB, 500, 0.4),
    (5 * MB, 600, 0.5),
    (2 * MB, 700, 0.6),
    (MB, 800, 0.7),
];
const SMALL_FILE: (u32, f32) = (1000, 0.8);

/// Pixel-count tiers, largest first: (threshold, max edge)
const PIXEL_TIERS: [(u64, u32); 2] = [(12 * MEGAPIXEL, 600), (8 * MEGAPIXEL, 700)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    pub max_edge: u32,
    pub quality: f32,
}

impl Budget {
    pub fn for_image(byte_size: u64, width: u32, height: u32) -> Self {
        let pixels = width as u64 * height as u64;
        Self {
            max_edge: max_edge_for_size(byte_size).min(max_edge_for_pixels(pixels)),
            quality: quality_for_size(byte_size),
        }
    }
}

pub fn max_edge_for_size(byte_size: u64) -> u32 {
    SIZE_TIERS
        .iter()
        .find(|(threshold, _, _)| byte_size >= *threshold)
        .map(|(_, edge, _)| *edge)
        .unwrap_or(SMALL_FILE.0)
}

pub fn quality_for_size(byte_size: u64) -> f32 {
    SIZE_TIERS
        .iter()
        .find(|(threshold, _, _)| byte_size >= *threshold)
        .map(|(_, _, quality)| *quality)
        .unwrap_or(SMALL_FILE.1)
}

/// Edge clamp implied by the pixel count, `u32::MAX` when no tier applies
pub fn max_edge_for_pixels(pixels: u64) -> u32 {
    PIXEL_TIERS
        .iter()
        .find(|(threshold, _)| pixels >= *threshold)
        .map(|(_, edge)| *edge)
        .unwrap_or(u32::MAX)
}

/// Scale `width x height` so the longest edge fits `max_edge`, keeping the
/// aspect ratio. Never upscales and never returns a zero dimension.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = max_edge as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}

pub fn needs_second_pass(output_len: u64, original_len: u64) -> bool {
    output_len > REENCODE_MIN_BYTES && output_len as f64 > original_len as f64 * REENCODE_RATIO
}

pub fn reduced_quality(quality: f32) -> f32 {
    (quality - QUALITY_STEP).max(QUALITY_FLOOR)
}

/// JPEG encoder quality (1..=100) from a 0..1 fraction
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
