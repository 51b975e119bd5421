//! Approximate glyph metrics for the PDF base-14 fonts.
//!
//! Widths come from the Adobe AFM files for Helvetica and Helvetica-Bold
//! (printable ASCII only). Courier is fixed pitch. Times is approximated from
//! Helvetica, which is close enough for wrapping decisions. Characters outside
//! ASCII get an average width.

use crate::styling::FontFamily;

/// A concrete face the PDF writer can name without embedding anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Standard {
        family: FontFamily,
        bold: bool,
        italic: bool,
    },
    /// ZapfDingbats, used for checkbox glyphs.
    Dingbats,
}

impl FontFace {
    pub fn regular(family: FontFamily) -> Self {
        FontFace::Standard {
            family,
            bold: false,
            italic: false,
        }
    }

    pub fn styled(family: FontFamily, bold: bool, italic: bool) -> Self {
        FontFace::Standard {
            family,
            bold,
            italic,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontFace::Standard { bold: true, .. })
    }

    /// PostScript name of the base-14 font.
    pub fn base_font(&self) -> &'static str {
        match *self {
            FontFace::Dingbats => "ZapfDingbats",
            FontFace::Standard {
                family,
                bold,
                italic,
            } => match (family, bold, italic) {
                (FontFamily::Helvetica, false, false) => "Helvetica",
                (FontFamily::Helvetica, true, false) => "Helvetica-Bold",
                (FontFamily::Helvetica, false, true) => "Helvetica-Oblique",
                (FontFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
                (FontFamily::Times, false, false) => "Times-Roman",
                (FontFamily::Times, true, false) => "Times-Bold",
                (FontFamily::Times, false, true) => "Times-Italic",
                (FontFamily::Times, true, true) => "Times-BoldItalic",
                (FontFamily::Courier, false, false) => "Courier",
                (FontFamily::Courier, true, false) => "Courier-Bold",
                (FontFamily::Courier, false, true) => "Courier-Oblique",
                (FontFamily::Courier, true, true) => "Courier-BoldOblique",
            },
        }
    }
}

// Widths for ' ' (0x20) through '~' (0x7e), in 1/1000 em.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const AVERAGE_WIDTH: u16 = 556;
const COURIER_WIDTH: u16 = 600;
const TIMES_SCALE: f32 = 0.92;

fn helvetica_width(ch: char, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    match ch {
        ' '..='~' => table[ch as usize - 0x20],
        '\t' => table[0] * 4,
        c if c.is_control() => 0,
        _ => AVERAGE_WIDTH,
    }
}

/// Advance width of one character in 1/1000 em.
pub fn char_width(face: FontFace, ch: char) -> f32 {
    match face {
        FontFace::Dingbats => match ch {
            '4' => 760.0,
            'o' => 761.0,
            _ => 800.0,
        },
        FontFace::Standard { family, bold, .. } => match family {
            FontFamily::Courier => {
                if ch.is_control() && ch != '\t' {
                    0.0
                } else {
                    COURIER_WIDTH as f32
                }
            }
            FontFamily::Helvetica => helvetica_width(ch, bold) as f32,
            FontFamily::Times => helvetica_width(ch, bold) as f32 * TIMES_SCALE,
        },
    }
}

/// Width of `text` in points at `size`.
///
/// ```
/// use slidepress::metrics::{text_width, FontFace};
/// use slidepress::styling::FontFamily;
///
/// let courier = FontFace::regular(FontFamily::Courier);
/// assert_eq!(text_width("abcd", courier, 10.0), 24.0);
/// ```
pub fn text_width(text: &str, face: FontFace, size: f32) -> f32 {
    text.chars().map(|c| char_width(face, c)).sum::<f32>() * size / 1000.0
}

/// Baseline-to-baseline distance used for every face.
pub fn line_height(size: f32) -> f32 {
    size * 1.2
}

/// Splits a word that is wider than `max_width` into pieces that fit. Always
/// makes progress: a single character wider than the limit is its own piece.
pub fn split_long_word(word: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    for ch in word.chars() {
        let w = char_width(face, ch) * size / 1000.0;
        if !current.is_empty() && width + w > max_width {
            pieces.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(ch);
        width += w;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedy word wrap of a single-style string. Explicit newlines are kept as
/// line boundaries.
pub fn wrap_text(text: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let space = text_width(" ", face, size);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut width = 0.0;
        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, face, size);
            if word_width > max_width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let mut pieces = split_long_word(word, face, size, max_width);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                width = text_width(&last, face, size);
                line = last;
                continue;
            }
            if line.is_empty() {
                line.push_str(word);
                width = word_width;
            } else if width + space + word_width <= max_width {
                line.push(' ');
                line.push_str(word);
                width += space + word_width;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
                width = word_width;
            }
        }
        lines.push(line);
    }
    lines
}
