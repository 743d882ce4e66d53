//! Page geometry and text measurement for the report
//!
//! All positions are millimetres from the top-left corner of an A4 page.
//! Text `y` is the baseline.

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 20.0;
pub const LINE_HEIGHT: f32 = 6.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

/// Box for a photo shown alone on its row
pub const SINGLE_BOX: (f32, f32) = (CONTENT_WIDTH - 20.0, 120.0);
/// Gap between the two photos of a pair
pub const PAIR_GUTTER: f32 = 10.0;
/// Box for each photo of a pair
pub const PAIR_BOX: (f32, f32) = ((CONTENT_WIDTH - PAIR_GUTTER) / 2.0, 90.0);

const PT_TO_MM: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
}

impl TextStyle {
    pub const TITLE: TextStyle = TextStyle::bold(18.0);
    pub const SECTION: TextStyle = TextStyle::bold(14.0);
    pub const FOOTER: TextStyle = TextStyle::bold(12.0);
    pub const BODY: TextStyle = TextStyle::regular(10.0);
    pub const BODY_BOLD: TextStyle = TextStyle::bold(10.0);
    pub const PLACEHOLDER: TextStyle = TextStyle::regular(9.0);
    pub const SMALL: TextStyle = TextStyle::regular(8.0);

    pub const fn regular(size: f32) -> Self {
        Self { size, bold: false }
    }

    pub const fn bold(size: f32) -> Self {
        Self { size, bold: true }
    }
}

/// Helvetica advance widths (1/1000 em) for printable ASCII
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn char_width(c: char) -> u16 {
    let base = match c {
        'à' | 'â' | 'ä' | 'á' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' => 'i',
        'ô' | 'ö' => 'o',
        'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'À' | 'Â' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Î' | 'Ï' => 'I',
        'Ô' => 'O',
        'Ù' | 'Û' => 'U',
        'Ç' => 'C',
        'œ' => return 944,
        'Œ' => return 1000,
        '’' | '‘' => return 222,
        other => other,
    };
    let code = base as u32;
    if (32..127).contains(&code) {
        HELVETICA[(code - 32) as usize]
    } else {
        556
    }
}

/// Rendered width of `text` in millimetres
pub fn text_width(text: &str, style: TextStyle) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    // Helvetica-Bold runs roughly 6% wider than the regular cut
    let factor = if style.bold { 1.06 } else { 1.0 };
    units as f32 / 1000.0 * style.size * PT_TO_MM * factor
}

/// Break `text` into lines no wider than `max_width`.
///
/// Words wider than a full line are split by character. Explicit newlines
/// are kept. Empty input yields a single empty line.
pub fn wrap(text: &str, max_width: f32, style: TextStyle) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if text_width(&candidate, style) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if text_width(word, style) <= max_width {
                line = word.to_string();
            } else {
                for c in word.chars() {
                    line.push(c);
                    if text_width(&line, style) > max_width && line.chars().count() > 1 {
                        line.pop();
                        lines.push(std::mem::take(&mut line));
                        line.push(c);
                    }
                }
            }
        }
        lines.push(line);
    }
    lines
}

/// Scale an image into a box, preserving aspect ratio and never enlarging
pub fn fit_box(width: f32, height: f32, box_width: f32, box_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (box_width / width).min(box_height / height).min(1.0);
    (width * scale, height * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxes() {
        assert_eq!(CONTENT_WIDTH, 170.0);
        assert_eq!(SINGLE_BOX, (150.0, 120.0));
        assert_eq!(PAIR_BOX, (80.0, 90.0));
    }

    #[test]
    fn test_fit_box() {
        assert_eq!(fit_box(600.0, 450.0, 150.0, 120.0), (150.0, 112.5));
        assert_eq!(fit_box(450.0, 600.0, 150.0, 120.0), (90.0, 120.0));
        // never enlarged
        assert_eq!(fit_box(40.0, 30.0, 150.0, 120.0), (40.0, 30.0));
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let small = text_width("Adresse du site", TextStyle::regular(10.0));
        let large = text_width("Adresse du site", TextStyle::regular(20.0));
        assert!((large - 2.0 * small).abs() < 1e-3);
        assert!(text_width("abc", TextStyle::bold(10.0)) > text_width("abc", TextStyle::BODY));
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "Usure importante des galets de guidage, remplacement conseillé \
                    avant la prochaine visite semestrielle du technicien";
        let lines = wrap(text, 60.0, TextStyle::BODY);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, TextStyle::BODY) <= 60.0);
        }
        assert_eq!(lines.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_wrap_splits_long_words_and_keeps_newlines() {
        let lines = wrap(&"x".repeat(200), 30.0, TextStyle::BODY);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 200);

        assert_eq!(wrap("a\nb", 100.0, TextStyle::BODY), vec!["a", "b"]);
        assert_eq!(wrap("", 100.0, TextStyle::BODY), vec![String::new()]);
    }
}
