//! PDF output through lopdf
//!
//! Text uses the standard Helvetica fonts with WinAnsi encoding, so no font
//! program is embedded. JPEG photos are copied as-is into DCT streams; other
//! formats are decoded and stored as Flate-compressed RGB with an optional
//! alpha soft mask.

use super::layout::{TextStyle, PAGE_HEIGHT, PAGE_WIDTH};
use super::DocumentSink;
use crate::error::{InspectionError, RenderAssetError};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat};
use inspection_types::ImageMime;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::{Cursor, Write};

const MM_TO_PT: f32 = 72.0 / 25.4;

/// Image data ready to become an XObject
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub format: ImageMime,
    pub data: ImageData,
}

#[derive(Debug, Clone)]
pub enum ImageData {
    /// Original JPEG bytes
    Dct { bytes: Vec<u8>, gray: bool },
    /// Zlib-compressed 8-bit RGB, plus zlib-compressed alpha when not opaque
    Flate { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

/// Decode an image for embedding, trying `preferred` first and then the
/// other known formats in fixed order.
pub fn prepare_image(
    bytes: &[u8],
    preferred: Option<ImageMime>,
) -> Result<PreparedImage, RenderAssetError> {
    let order = match preferred {
        Some(mime) => mime.fallback_order(),
        None => ImageMime::ALL.to_vec(),
    };
    for format in order {
        match prepare_as(bytes, format) {
            Ok(image) => {
                if Some(format) != preferred {
                    tracing::debug!(declared = ?preferred, actual = %format, "Embedded with fallback format");
                }
                return Ok(image);
            }
            Err(e) => tracing::trace!(format = %format, error = %e, "Embed attempt failed"),
        }
    }
    Err(RenderAssetError::NoFormat)
}

fn prepare_as(bytes: &[u8], format: ImageMime) -> Result<PreparedImage, RenderAssetError> {
    let unreadable = |e: image::ImageError| RenderAssetError::Unreadable(e.to_string());
    match format {
        ImageMime::Jpeg => {
            let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(unreadable)?;
            let color = decoder.color_type();
            // Full decode so a truncated file is caught here, not in the viewer
            let decoded = DynamicImage::from_decoder(decoder).map_err(unreadable)?;
            // The decoder reports CMYK and YCCK as Rgb8; only frames whose
            // stored components match the colour space can be copied as DCT
            let gray = match (color, frame_components(bytes)) {
                (ColorType::L8, Some(1)) => true,
                (ColorType::Rgb8, Some(3)) => false,
                _ => return flate_image(&decoded, format),
            };
            Ok(PreparedImage {
                width: decoded.width(),
                height: decoded.height(),
                format,
                data: ImageData::Dct {
                    bytes: bytes.to_vec(),
                    gray,
                },
            })
        }
        other => {
            let image_format = match other {
                ImageMime::Png => ImageFormat::Png,
                ImageMime::Webp => ImageFormat::WebP,
                ImageMime::Gif => ImageFormat::Gif,
                ImageMime::Jpeg => ImageFormat::Jpeg,
            };
            let decoded =
                image::load_from_memory_with_format(bytes, image_format).map_err(unreadable)?;
            flate_image(&decoded, other)
        }
    }
}

/// Component count from the first start-of-frame segment of a JPEG
fn frame_components(jpeg: &[u8]) -> Option<u8> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return None;
        }
        let marker = jpeg[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            return jpeg.get(pos + 9).copied();
        }
        pos += 2 + len;
    }
    None
}

fn flate_image(img: &DynamicImage, format: ImageMime) -> Result<PreparedImage, RenderAssetError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let opaque = alpha.iter().all(|a| *a == u8::MAX);

    let alpha = if opaque { None } else { Some(zlib(&alpha)?) };
    Ok(PreparedImage {
        width,
        height,
        format,
        data: ImageData::Flate {
            rgb: zlib(&rgb)?,
            alpha,
        },
    })
}

fn zlib(raw: &[u8]) -> Result<Vec<u8>, RenderAssetError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| RenderAssetError::Unreadable(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| RenderAssetError::Unreadable(e.to_string()))
}

/// Map text to WinAnsi bytes; characters outside the code page become `?`
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            'Œ' => 0x8C,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            'œ' => 0x9C,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

struct PageBuilder {
    operations: Vec<Operation>,
    xobjects: Dictionary,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            xobjects: Dictionary::new(),
        }
    }
}

/// [`DocumentSink`] producing a PDF document
pub struct PdfSink {
    doc: Document,
    pages_id: ObjectId,
    fonts_id: ObjectId,
    page_ids: Vec<ObjectId>,
    page: PageBuilder,
    image_count: usize,
    title: String,
}

impl PdfSink {
    pub fn new(title: &str) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let fonts_id = doc.add_object(dictionary! {
            "F1" => regular,
            "F2" => bold,
        });
        Self {
            doc,
            pages_id,
            fonts_id,
            page_ids: Vec::new(),
            page: PageBuilder::new(),
            image_count: 0,
            title: title.to_string(),
        }
    }

    fn flush_page(&mut self) -> Result<(), InspectionError> {
        let page = std::mem::replace(&mut self.page, PageBuilder::new());
        let content = Content {
            operations: page.operations,
        };
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let resources = dictionary! {
            "Font" => self.fonts_id,
            "XObject" => page.xobjects,
        };
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH * MM_TO_PT),
                Object::Real(PAGE_HEIGHT * MM_TO_PT),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn add_image_object(&mut self, image: &PreparedImage) -> ObjectId {
        let (filter, color_space, bytes, smask) = match &image.data {
            ImageData::Dct { bytes, gray } => (
                "DCTDecode",
                if *gray { "DeviceGray" } else { "DeviceRGB" },
                bytes.clone(),
                None,
            ),
            ImageData::Flate { rgb, alpha } => {
                let smask = alpha.as_ref().map(|alpha| {
                    self.doc.add_object(
                        Stream::new(
                            dictionary! {
                                "Type" => "XObject",
                                "Subtype" => "Image",
                                "Width" => image.width as i64,
                                "Height" => image.height as i64,
                                "ColorSpace" => "DeviceGray",
                                "BitsPerComponent" => 8,
                                "Filter" => "FlateDecode",
                            },
                            alpha.clone(),
                        )
                        .with_compression(false),
                    )
                });
                ("FlateDecode", "DeviceRGB", rgb.clone(), smask)
            }
        };

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => filter,
        };
        if let Some(smask) = smask {
            dict.set("SMask", smask);
        }
        self.doc
            .add_object(Stream::new(dict, bytes).with_compression(false))
    }

    /// Finish the document and serialize it
    pub fn finish(mut self) -> Result<Vec<u8>, InspectionError> {
        self.flush_page()?;

        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::String(win_ansi(&self.title), StringFormat::Literal),
            "Producer" => Object::String(
                format!("inspection-core {}", env!("CARGO_PKG_VERSION")).into_bytes(),
                StringFormat::Literal,
            ),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| InspectionError::Report(e.to_string()))?;
        Ok(output)
    }
}

impl DocumentSink for PdfSink {
    fn add_page(&mut self) -> Result<(), InspectionError> {
        self.flush_page()
    }

    fn page_count(&self) -> usize {
        self.page_ids.len() + 1
    }

    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) {
        let font = if style.bold { "F2" } else { "F1" };
        self.page.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), Object::Real(style.size)]),
            Operation::new(
                "Td",
                vec![
                    Object::Real(x * MM_TO_PT),
                    Object::Real((PAGE_HEIGHT - y) * MM_TO_PT),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn image(
        &mut self,
        image: &PreparedImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), RenderAssetError> {
        if width <= 0.0 || height <= 0.0 {
            return Err(RenderAssetError::Unreadable("empty placement box".into()));
        }
        let image_id = self.add_image_object(image);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        self.page.xobjects.set(name.as_bytes(), image_id);

        self.page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width * MM_TO_PT),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(height * MM_TO_PT),
                    Object::Real(x * MM_TO_PT),
                    Object::Real((PAGE_HEIGHT - y - height) * MM_TO_PT),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{jpeg_bytes, pad_jpeg, png_bytes};

    #[test]
    fn test_win_ansi() {
        assert_eq!(win_ansi("Oui"), b"Oui".to_vec());
        assert_eq!(win_ansi("É"), vec![0xC9]);
        assert_eq!(win_ansi("Manœuvre"), b"Man\x9Cuvre".to_vec());
        assert_eq!(win_ansi("日"), b"?".to_vec());
    }

    #[test]
    fn test_prepare_jpeg_keeps_original_bytes() {
        let jpeg = jpeg_bytes(30, 20, 80);
        let prepared = prepare_image(&jpeg, Some(ImageMime::Jpeg)).unwrap();
        assert_eq!((prepared.width, prepared.height), (30, 20));
        match prepared.data {
            ImageData::Dct { bytes, gray } => {
                assert_eq!(bytes, jpeg);
                assert!(!gray);
            }
            ImageData::Flate { .. } => panic!("expected DCT data"),
        }
    }

    #[test]
    fn test_prepare_falls_back_when_declared_format_is_wrong() {
        let png = png_bytes(12, 8);
        let prepared = prepare_image(&png, Some(ImageMime::Jpeg)).unwrap();
        assert_eq!(prepared.format, ImageMime::Png);
        assert!(matches!(prepared.data, ImageData::Flate { alpha: None, .. }));
    }

    #[test]
    fn test_frame_components() {
        assert_eq!(frame_components(&jpeg_bytes(8, 8, 80)), Some(3));
        assert_eq!(frame_components(&pad_jpeg(&jpeg_bytes(8, 8, 80), 100_000)), Some(3));

        let mut gray = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut gray)
            .encode_image(&image::GrayImage::new(8, 8))
            .unwrap();
        assert_eq!(frame_components(&gray), Some(1));

        // SOI, APP14 "Adobe", SOF0 with four components
        let mut cmyk = vec![0xFF, 0xD8, 0xFF, 0xEE, 0x00, 0x0E];
        cmyk.extend_from_slice(b"Adobe\x00\x64\x00\x00\x00\x00\x00");
        cmyk.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x08, 0x00, 0x08, 0x04]);
        assert_eq!(frame_components(&cmyk), Some(4));

        assert_eq!(frame_components(b"not a jpeg"), None);
    }

    #[test]
    fn test_gray_jpeg_stays_dct() {
        let mut gray = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut gray)
            .encode_image(&image::GrayImage::from_pixel(16, 8, image::Luma([90])))
            .unwrap();
        let image = prepare_image(&gray, Some(ImageMime::Jpeg)).unwrap();
        assert!(matches!(image.data, ImageData::Dct { gray: true, .. }));
    }

    #[test]
    fn test_prepare_rejects_garbage() {
        assert!(matches!(
            prepare_image(b"definitely not an image", Some(ImageMime::Png)),
            Err(RenderAssetError::NoFormat)
        ));
    }

    #[test]
    fn test_sink_produces_loadable_pdf() {
        let mut sink = PdfSink::new("Rapport");
        sink.text("Adresse du site: 1 rue Émile Zola", 20.0, 30.0, TextStyle::BODY);
        let image = prepare_image(&png_bytes(40, 30), Some(ImageMime::Png)).unwrap();
        sink.image(&image, 30.0, 40.0, 40.0, 30.0).unwrap();
        sink.add_page().unwrap();
        sink.text("Fin du rapport", 75.0, 40.0, TextStyle::FOOTER);
        assert_eq!(sink.page_count(), 2);

        let bytes = sink.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
