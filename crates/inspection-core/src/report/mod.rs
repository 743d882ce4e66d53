//! Report rendering
//!
//! [`ReportRenderer`] walks the snapshot section by section and drives a
//! [`DocumentSink`]. Each photo is decoded on its own; one that cannot be
//! decoded becomes an inline placeholder and the rest of the document is
//! still produced.

pub mod layout;
pub mod pdf;

use crate::cancel::CancelToken;
use crate::config::ReportConfig;
use crate::error::{InspectionError, RenderAssetError, Result};
use chrono::{DateTime, Local, Utc};
use inspection_types::{DataUri, FieldValue, Photo, Snapshot, SECTIONS};
use layout::{
    fit_box, wrap, TextStyle, CONTENT_WIDTH, LINE_HEIGHT, MARGIN, PAGE_HEIGHT, PAIR_BOX,
    PAIR_GUTTER, SINGLE_BOX,
};
pub use pdf::{prepare_image, ImageData, PdfSink, PreparedImage};

const TITLE_X: f32 = 45.0;
const FOOTER_X: f32 = 75.0;
const SINGLE_COLUMNS: [f32; 1] = [MARGIN + 10.0];
const PAIR_COLUMNS: [f32; 2] = [MARGIN, MARGIN + PAIR_BOX.0 + PAIR_GUTTER];

/// Drawing surface the renderer lays pages out on
pub trait DocumentSink {
    /// Close the current page and start a new one
    fn add_page(&mut self) -> Result<()>;

    /// Pages so far, including the one being drawn
    fn page_count(&self) -> usize;

    /// Draw one line of text with its baseline at `y`
    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle);

    /// Draw an image with its top-left corner at (`x`, `y`)
    fn image(
        &mut self,
        image: &PreparedImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> std::result::Result<(), RenderAssetError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub sections: usize,
    pub images: usize,
    pub failed_photos: usize,
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub pdf: Vec<u8>,
    /// Suggested download name
    pub file_name: String,
    pub pages: usize,
    pub failed_photos: usize,
}

pub fn file_name_for(generated_at: DateTime<Local>) -> String {
    format!(
        "Etat_lieux_ascenseur_{}.pdf",
        generated_at.with_timezone(&Utc).format("%Y-%m-%d")
    )
}

#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    config: ReportConfig,
}

impl ReportRenderer {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Render the snapshot to PDF bytes.
    ///
    /// `cancel` is checked between photos; a cancelled render returns
    /// [`InspectionError::Cancelled`] and produces nothing.
    pub async fn render(&self, snapshot: &Snapshot, cancel: &CancelToken) -> Result<RenderedReport> {
        let generated_at = Local::now();
        let mut sink = PdfSink::new(&self.config.title);
        let summary = self
            .render_into(&mut sink, snapshot, generated_at, cancel)
            .await?;
        let pages = sink.page_count();

        let pdf = tokio::task::spawn_blocking(move || sink.finish())
            .await
            .map_err(|e| InspectionError::Report(e.to_string()))??;

        tracing::info!(
            pages,
            sections = summary.sections,
            images = summary.images,
            failed = summary.failed_photos,
            size = pdf.len(),
            "Report rendered"
        );
        Ok(RenderedReport {
            pdf,
            file_name: file_name_for(generated_at),
            pages,
            failed_photos: summary.failed_photos,
        })
    }

    /// Lay the report out on any sink
    pub async fn render_into<S: DocumentSink + Send>(
        &self,
        sink: &mut S,
        snapshot: &Snapshot,
        generated_at: DateTime<Local>,
        cancel: &CancelToken,
    ) -> Result<RenderSummary> {
        let mut flow = Flow { sink, y: MARGIN };
        let mut summary = RenderSummary::default();

        flow.write(&self.config.title, TITLE_X, CONTENT_WIDTH, TextStyle::TITLE)?;
        flow.y += 15.0;
        let stamp = format!(
            "Généré le {} à {}",
            generated_at.format("%d/%m/%Y"),
            generated_at.format("%H:%M:%S")
        );
        flow.write(&stamp, MARGIN, CONTENT_WIDTH, TextStyle::SMALL)?;
        flow.y += 15.0;

        for section in SECTIONS.iter() {
            if !section.has_data(&snapshot.form_data) {
                continue;
            }
            summary.sections += 1;

            flow.ensure_room(20.0)?;
            flow.y += 10.0;
            flow.write(section.title, MARGIN, CONTENT_WIDTH, TextStyle::SECTION)?;
            flow.y += 5.0;

            for field in section.fields {
                let Some(value) = snapshot.form_data.get(field.name) else {
                    continue;
                };
                if !value.is_present() {
                    continue;
                }
                let shown = match value {
                    FieldValue::Bool(true) => self.config.yes_label.as_str(),
                    FieldValue::Bool(false) => self.config.no_label.as_str(),
                    FieldValue::Text(text) => text.as_str(),
                };
                flow.ensure_room(15.0)?;
                flow.write(
                    &format!("{}: {}", field.label, shown),
                    MARGIN,
                    CONTENT_WIDTH,
                    TextStyle::BODY,
                )?;
                flow.y += 3.0;
            }

            if section.accepts_photos() {
                let photos: Vec<&Photo> = snapshot
                    .section_photos
                    .get(section.index)
                    .iter()
                    .filter(|p| p.is_valid())
                    .collect();
                if !photos.is_empty() {
                    self.photo_block(&mut flow, section.index, &photos, cancel, &mut summary)
                        .await?;
                }
            }
        }

        flow.ensure_room(20.0)?;
        flow.y += 20.0;
        flow.write(&self.config.footer, FOOTER_X, CONTENT_WIDTH, TextStyle::FOOTER)?;

        Ok(summary)
    }

    async fn photo_block<S: DocumentSink + Send>(
        &self,
        flow: &mut Flow<'_, S>,
        section: usize,
        photos: &[&Photo],
        cancel: &CancelToken,
        summary: &mut RenderSummary,
    ) -> Result<()> {
        flow.ensure_room(15.0)?;
        flow.write(
            &format!("Photos associées: {}", photos.len()),
            MARGIN,
            CONTENT_WIDTH,
            TextStyle::BODY_BOLD,
        )?;
        flow.y += 8.0;

        let (columns, (box_width, box_height)): (&[f32], _) = if photos.len() == 1 {
            (&SINGLE_COLUMNS[..], SINGLE_BOX)
        } else {
            (&PAIR_COLUMNS[..], PAIR_BOX)
        };

        for (row, chunk) in photos.chunks(columns.len()).enumerate() {
            let mut cells = Vec::with_capacity(chunk.len());
            for (col, photo) in chunk.iter().enumerate() {
                if cancel.is_cancelled() {
                    tracing::info!(section, "Report rendering cancelled");
                    return Err(InspectionError::Cancelled);
                }
                let number = row * columns.len() + col + 1;
                cells.push(match load_photo(photo).await {
                    Ok(image) => {
                        let (w, h) =
                            fit_box(image.width as f32, image.height as f32, box_width, box_height);
                        Cell::Image { image, w, h }
                    }
                    Err(e) => {
                        tracing::warn!(section, photo = %photo.display_name, error = %e, "Photo could not be rendered");
                        Cell::Failed(placeholder(number, photo, &e))
                    }
                });
            }

            let tallest = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Image { h, .. } => *h,
                    Cell::Failed(_) => 0.0,
                })
                .fold(0.0, f32::max);
            flow.ensure_room(tallest + 20.0)?;

            let top = flow.y;
            let mut used: f32 = 0.0;
            for ((cell, photo), x) in cells.into_iter().zip(chunk).zip(columns) {
                let height = match cell {
                    Cell::Image { image, w, h } => {
                        match flow.sink.image(&image, *x, top, w, h) {
                            Ok(()) => {
                                summary.images += 1;
                                let caption = wrap(&photo.display_name, box_width, TextStyle::SMALL);
                                draw_lines(flow.sink, &caption, *x, top + h + 3.0, TextStyle::SMALL);
                                h + 3.0 + caption.len() as f32 * LINE_HEIGHT + 8.0
                            }
                            Err(e) => {
                                tracing::warn!(section, photo = %photo.display_name, error = %e, "Photo could not be placed");
                                let number = photos
                                    .iter()
                                    .position(|p| p.id == photo.id)
                                    .map_or(0, |i| i + 1);
                                summary.failed_photos += 1;
                                self.failed_cell(flow, &placeholder(number, photo, &e), *x, top, box_width)
                            }
                        }
                    }
                    Cell::Failed(text) => {
                        summary.failed_photos += 1;
                        self.failed_cell(flow, &text, *x, top, box_width)
                    }
                };
                used = used.max(height);
            }
            flow.y = top + used;
        }
        flow.y += 5.0;
        Ok(())
    }

    fn failed_cell<S: DocumentSink>(
        &self,
        flow: &mut Flow<'_, S>,
        text: &str,
        x: f32,
        top: f32,
        width: f32,
    ) -> f32 {
        let lines = wrap(text, width, TextStyle::PLACEHOLDER);
        draw_lines(flow.sink, &lines, x, top, TextStyle::PLACEHOLDER);
        lines.len() as f32 * LINE_HEIGHT + 8.0
    }
}

enum Cell {
    Image { image: PreparedImage, w: f32, h: f32 },
    Failed(String),
}

fn placeholder(number: usize, photo: &Photo, error: &RenderAssetError) -> String {
    format!("Photo {}: {} (erreur: {})", number, photo.display_name, error)
}

fn draw_lines<S: DocumentSink>(sink: &mut S, lines: &[String], x: f32, y: f32, style: TextStyle) {
    for (i, line) in lines.iter().enumerate() {
        sink.text(line, x, y + i as f32 * LINE_HEIGHT, style);
    }
}

/// Decode a stored photo back into embeddable image data
pub async fn load_photo(photo: &Photo) -> std::result::Result<PreparedImage, RenderAssetError> {
    let uri = DataUri::parse(&photo.embedded_data)?;
    let preferred = uri.image_mime();
    let bytes = uri.decode()?;
    tokio::task::spawn_blocking(move || prepare_image(&bytes, preferred))
        .await
        .map_err(|e| RenderAssetError::Unreadable(e.to_string()))?
}

/// Vertical cursor over a sink
struct Flow<'a, S> {
    sink: &'a mut S,
    y: f32,
}

impl<S: DocumentSink> Flow<'_, S> {
    fn ensure_room(&mut self, needed: f32) -> Result<()> {
        if self.y + needed > PAGE_HEIGHT - MARGIN {
            self.sink.add_page()?;
            self.y = MARGIN;
        }
        Ok(())
    }

    /// Wrapped text at the cursor. Each line that would fall into the
    /// bottom margin moves to a new page first.
    fn write(&mut self, text: &str, x: f32, max_width: f32, style: TextStyle) -> Result<()> {
        for line in wrap(text, max_width, style) {
            if self.y >= PAGE_HEIGHT - MARGIN {
                self.sink.add_page()?;
                self.y = MARGIN;
            }
            self.sink.text(&line, x, self.y, style);
            self.y += LINE_HEIGHT;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{jpeg_bytes, png_bytes};
    use chrono::TimeZone;
    use inspection_types::ImageMime;

    #[derive(Debug, Clone, PartialEq)]
    enum Drawn {
        Text { page: usize, text: String, x: f32, y: f32 },
        Image { page: usize, x: f32, y: f32, w: f32, h: f32 },
    }

    #[derive(Default)]
    struct RecordingSink {
        pages: usize,
        drawn: Vec<Drawn>,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<&str> {
            self.drawn
                .iter()
                .filter_map(|d| match d {
                    Drawn::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }

        fn images(&self) -> Vec<(f32, f32, f32, f32)> {
            self.drawn
                .iter()
                .filter_map(|d| match d {
                    Drawn::Image { x, y, w, h, .. } => Some((*x, *y, *w, *h)),
                    _ => None,
                })
                .collect()
        }
    }

    impl DocumentSink for RecordingSink {
        fn add_page(&mut self) -> Result<()> {
            self.pages += 1;
            Ok(())
        }

        fn page_count(&self) -> usize {
            self.pages + 1
        }

        fn text(&mut self, text: &str, x: f32, y: f32, _style: TextStyle) {
            self.drawn.push(Drawn::Text {
                page: self.pages,
                text: text.to_string(),
                x,
                y,
            });
        }

        fn image(
            &mut self,
            _image: &PreparedImage,
            x: f32,
            y: f32,
            w: f32,
            h: f32,
        ) -> std::result::Result<(), RenderAssetError> {
            self.drawn.push(Drawn::Image {
                page: self.pages,
                x,
                y,
                w,
                h,
            });
            Ok(())
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    fn jpeg_photo(name: &str, w: u32, h: u32) -> Photo {
        let bytes = jpeg_bytes(w, h, 80);
        Photo::new(name, DataUri::encode(&bytes, "image/jpeg"), bytes.len() as u64)
    }

    async fn render(snapshot: &Snapshot) -> (RecordingSink, RenderSummary) {
        let mut sink = RecordingSink::default();
        let summary = ReportRenderer::default()
            .render_into(&mut sink, snapshot, at(), &CancelToken::new())
            .await
            .unwrap();
        (sink, summary)
    }

    #[tokio::test]
    async fn test_empty_snapshot_has_title_and_footer() {
        let (sink, summary) = render(&Snapshot::new()).await;
        let texts = sink.texts();
        assert_eq!(texts[0], "ÉTAT DES LIEUX ASCENSEUR");
        assert_eq!(texts[1], "Généré le 05/03/2024 à 14:07:09");
        assert_eq!(texts.last(), Some(&"Fin du rapport"));
        assert_eq!(summary.sections, 0);
    }

    #[tokio::test]
    async fn test_only_sections_with_data_are_rendered() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "12 rue des Lilas");
        snapshot.form_data.set("eclairage", false);
        snapshot.form_data.set("inconnu", "ignored");

        let (sink, summary) = render(&snapshot).await;
        let texts = sink.texts();
        assert_eq!(summary.sections, 2);
        assert!(texts.contains(&"1. IDENTIFICATION"));
        assert!(texts.contains(&"Adresse du site: 12 rue des Lilas"));
        assert!(texts.contains(&"Éclairage cabine: Non"));
        assert!(!texts.iter().any(|t| t.contains("ignored")));
        assert!(!texts.contains(&"3. PORTES PALIÈRES"));
    }

    #[tokio::test]
    async fn test_single_photo_fits_single_box() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "x");
        snapshot.section_photos.push(0, jpeg_photo("facade.jpg", 600, 450));

        let (sink, summary) = render(&snapshot).await;
        assert!(sink.texts().contains(&"Photos associées: 1"));
        assert!(sink.texts().contains(&"facade.jpg"));
        let images = sink.images();
        assert_eq!(images.len(), 1);
        let (x, _, w, h) = images[0];
        assert_eq!(x, MARGIN + 10.0);
        assert_eq!((w, h), (150.0, 112.5));
        assert_eq!(summary.images, 1);
    }

    #[tokio::test]
    async fn test_photos_are_paired() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "x");
        snapshot.section_photos.extend(
            0,
            [
                jpeg_photo("a.jpg", 400, 300),
                jpeg_photo("b.jpg", 300, 400),
                jpeg_photo("c.jpg", 40, 30),
            ],
        );

        let (sink, _) = render(&snapshot).await;
        let images = sink.images();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].0, MARGIN);
        assert_eq!(images[1].0, MARGIN + 90.0);
        assert_eq!(images[0].1, images[1].1);
        assert!(images[2].1 > images[0].1);
        for (_, _, w, h) in &images {
            assert!(*w <= PAIR_BOX.0 && *h <= PAIR_BOX.1);
        }
        // small images are not enlarged
        assert_eq!((images[2].2, images[2].3), (40.0, 30.0));
    }

    #[tokio::test]
    async fn test_broken_photo_becomes_placeholder() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("etat_interieur", "Bon");
        let broken = Photo::new("bad.jpg", DataUri::encode(b"garbage", "image/jpeg"), 7);
        snapshot
            .section_photos
            .extend(1, [jpeg_photo("ok.jpg", 200, 100), broken, jpeg_photo("ok2.jpg", 200, 100)]);
        snapshot.form_data.set("adresse", "after");

        let (sink, summary) = render(&snapshot).await;
        assert_eq!(summary.failed_photos, 1);
        assert_eq!(summary.images, 2);
        assert!(sink
            .texts()
            .iter()
            .any(|t| t.starts_with("Photo 2: bad.jpg (erreur:")));
        assert_eq!(sink.texts().last(), Some(&"Fin du rapport"));
    }

    #[tokio::test]
    async fn test_invalid_photos_are_not_counted() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "x");
        let mut lost = jpeg_photo("lost.jpg", 10, 10);
        lost.embedded_data = "blob:gone".into();
        snapshot
            .section_photos
            .extend(0, [jpeg_photo("kept.jpg", 10, 10), lost]);

        let (sink, _) = render(&snapshot).await;
        assert!(sink.texts().contains(&"Photos associées: 1"));
        assert!(!sink.texts().iter().any(|t| t.contains("lost.jpg")));
    }

    #[tokio::test]
    async fn test_cancel_between_photos() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "x");
        snapshot.section_photos.push(0, jpeg_photo("a.jpg", 10, 10));
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = ReportRenderer::default()
            .render_into(&mut RecordingSink::default(), &snapshot, at(), &cancel)
            .await;
        assert!(matches!(result, Err(InspectionError::Cancelled)));
    }

    #[tokio::test]
    async fn test_long_content_breaks_pages() {
        let mut snapshot = Snapshot::new();
        for section in SECTIONS.iter() {
            for field in section.fields {
                snapshot
                    .form_data
                    .set(field.name, "observation détaillée ".repeat(20));
            }
        }
        let (sink, _) = render(&snapshot).await;
        assert!(sink.page_count() > 2);
        for drawn in &sink.drawn {
            if let Drawn::Text { y, .. } = drawn {
                assert!(*y < PAGE_HEIGHT - MARGIN);
            }
        }
    }

    #[tokio::test]
    async fn test_png_photo_uses_declared_format() {
        let bytes = png_bytes(30, 20);
        let photo = Photo::new("p.png", DataUri::encode(&bytes, "image/png"), bytes.len() as u64);
        let image = load_photo(&photo).await.unwrap();
        assert_eq!(image.format, ImageMime::Png);
        assert_eq!((image.width, image.height), (30, 20));
    }

    #[tokio::test]
    async fn test_render_produces_pdf() {
        let mut snapshot = Snapshot::new();
        snapshot.form_data.set("adresse", "Résidence Les Érables");
        snapshot.section_photos.push(0, jpeg_photo("a.jpg", 64, 48));

        let report = ReportRenderer::default()
            .render(&snapshot, &CancelToken::new())
            .await
            .unwrap();
        assert!(report.pdf.starts_with(b"%PDF-"));
        assert!(report.file_name.starts_with("Etat_lieux_ascenseur_"));
        assert!(report.file_name.ends_with(".pdf"));
        assert_eq!(report.pages, 1);
        assert_eq!(report.failed_photos, 0);
        let doc = lopdf::Document::load_mem(&report.pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
