//! Text measurement and greedy word wrapping for text elements
//!
//! Baked text is set in the standard Helvetica font, so measurement uses
//! Helvetica's AFM advance widths (1/1000 em). The same wrapping is used to
//! size a text element when it is created and to lay it out when baked.

/// Advance-width source for a font
pub trait FontMetrics {
    /// Width of `text` in document units at `font_size`
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

/// Standard 14 Helvetica, WinAnsi subset
#[derive(Debug, Clone, Copy, Default)]
pub struct Helvetica;

impl Helvetica {
    pub const PDF_NAME: &'static str = "Helvetica";

    /// Advance widths for ASCII 32..=126
    const ASCII_WIDTHS: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
        278, 278, 278, 469, 556, 333, // '['..'`'
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
        334, 260, 334, 584, // '{'..'~'
    ];

    const DEFAULT_WIDTH: u16 = 556;

    fn glyph_width(c: char) -> u16 {
        match c as u32 {
            code @ 32..=126 => Self::ASCII_WIDTHS[(code - 32) as usize],
            _ => Self::DEFAULT_WIDTH,
        }
    }
}

impl FontMetrics for Helvetica {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units: u32 = text.chars().map(|c| Self::glyph_width(c) as u32).sum();
        units as f64 * font_size / 1000.0
    }
}

/// Line height used for both sizing and baking
pub fn line_height(font_size: f64, factor: f64) -> f64 {
    font_size * factor
}

/// Wrap `text` into lines no wider than `max_width`.
///
/// Explicit line breaks always start a new line and empty lines are kept.
/// Inside a paragraph, space-separated words are packed greedily; a word
/// wider than `max_width` on its own gets a line to itself.
pub fn wrap_text<M: FontMetrics>(
    metrics: &M,
    text: &str,
    font_size: f64,
    max_width: f64,
) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let mut current: Option<String> = None;

        for word in paragraph.split(' ') {
            current = Some(match current.take() {
                None => word.to_string(),
                Some(line) => {
                    let candidate = format!("{} {}", line, word);
                    if metrics.text_width(&candidate, font_size) <= max_width {
                        candidate
                    } else {
                        lines.push(line);
                        word.to_string()
                    }
                }
            });
        }

        lines.push(current.unwrap_or_default());
    }

    lines
}
