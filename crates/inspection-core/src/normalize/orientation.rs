//! Upright rendering from the EXIF orientation tag

use image::DynamicImage;
use std::io::Cursor;

/// The eight EXIF orientation states (tag 0x0112)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Identity,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map a raw tag value; anything outside 1..=8 is treated as identity
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Identity,
        }
    }

    /// Read the tag from the original file bytes.
    ///
    /// Missing or unreadable metadata yields `Identity`; this never fails.
    pub fn read(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::trace!(error = %e, "No readable EXIF metadata");
                return Orientation::Identity;
            }
        };
        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Self::from_tag)
            .unwrap_or_default()
    }

    /// Width and height trade places for the four 90 degree variants
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }

    pub fn upright_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Identity => img,
            Orientation::FlipHorizontal => img.fliph(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::FlipVertical => img.flipv(),
            Orientation::Transpose => img.rotate90().fliph(),
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Transverse => img.rotate270().fliph(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn marked() -> DynamicImage {
        // 3x2, red pixel at top-left
        let mut img = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    fn red_at(img: &DynamicImage) -> (u32, u32) {
        img.pixels()
            .find(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn test_unknown_tags_are_identity() {
        assert_eq!(Orientation::from_tag(0), Orientation::Identity);
        assert_eq!(Orientation::from_tag(9), Orientation::Identity);
    }

    #[test]
    fn test_missing_metadata_is_identity() {
        assert_eq!(Orientation::read(b"not an image"), Orientation::Identity);
        assert_eq!(Orientation::read(&[]), Orientation::Identity);
    }

    #[test]
    fn test_rotated_variants_swap_dimensions() {
        for tag in 1..=8 {
            let o = Orientation::from_tag(tag);
            let out = o.apply(marked());
            assert_eq!(
                out.dimensions(),
                o.upright_dimensions(3, 2),
                "tag {}",
                tag
            );
            assert_eq!(o.swaps_dimensions(), tag >= 5);
        }
    }

    #[test]
    fn test_pixel_placement() {
        assert_eq!(red_at(&Orientation::Identity.apply(marked())), (0, 0));
        assert_eq!(red_at(&Orientation::FlipHorizontal.apply(marked())), (2, 0));
        assert_eq!(red_at(&Orientation::Rotate180.apply(marked())), (2, 1));
        assert_eq!(red_at(&Orientation::FlipVertical.apply(marked())), (0, 1));
        // 90 degrees clockwise: top-left moves to top-right of a 2x3 image
        assert_eq!(red_at(&Orientation::Rotate90.apply(marked())), (1, 0));
        assert_eq!(red_at(&Orientation::Rotate270.apply(marked())), (0, 2));
        assert_eq!(red_at(&Orientation::Transpose.apply(marked())), (0, 0));
        assert_eq!(red_at(&Orientation::Transverse.apply(marked())), (1, 2));
    }
}
