//! Code block rendering: height estimate, page-break policy, the boxed
//! drawing, and the fixed-size box used for diagrams that could not be
//! rendered.

use crate::canvas::{Canvas, Rect, Span, Stroke, TextFlow};
use crate::highlighting::{self, HighlightedToken};
use crate::metrics::{self, FontFace};
use crate::styling::{Color, FontFamily};
use crate::LayoutError;
use log::{debug, warn};

pub const LINE_HEIGHT: f32 = 12.0;
pub const PADDING: f32 = 20.0;
pub const MAX_CHARS_PER_LINE: usize = 80;
pub const MIN_HEIGHT: f32 = 40.0;

/// Space kept free below a code block when deciding on a page break.
const BOTTOM_RESERVE: f32 = 50.0;
const LOW_SPACE: f32 = 100.0;
const LARGE_BLOCK: f32 = 200.0;
const TEXT_INSET: f32 = 10.0;
const CORNER_RADIUS: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct CodeStyle {
    pub family: FontFamily,
    pub size: f32,
    pub text: Color,
    pub border: Color,
    pub fill: Color,
    pub badge_fill: Color,
    pub badge_text: Color,
    pub label_family: FontFamily,
}

/// Source lines the way the height estimate counts them: split on `\n`,
/// with trailing empty lines dropped.
fn source_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Total wrapped line count of `text` at [`MAX_CHARS_PER_LINE`].
pub fn wrapped_line_count(text: &str) -> usize {
    source_lines(text)
        .iter()
        .map(|line| line.chars().count().div_ceil(MAX_CHARS_PER_LINE).max(1))
        .sum()
}

/// Vertical space reserved for a code block.
///
/// ```
/// use slidepress::code::estimate_code_height;
/// assert_eq!(estimate_code_height(""), 40.0);
/// assert_eq!(estimate_code_height("a\nb\nc"), 56.0);
/// assert_eq!(estimate_code_height(&"x".repeat(161)), 56.0);
/// ```
pub fn estimate_code_height(text: &str) -> f32 {
    let lines = wrapped_line_count(text) as f32;
    (lines * LINE_HEIGHT + PADDING).max(MIN_HEIGHT)
}

/// Whether a block of `estimated` height must start on a fresh page when
/// `available` points remain between the cursor and the bottom of the bounds.
/// Small blocks never force a break; they may overflow a little instead.
pub fn needs_page_break(available: f32, estimated: f32) -> bool {
    available - BOTTOM_RESERVE < LOW_SPACE && estimated > LARGE_BLOCK
}

fn expand_tabs(text: &str) -> String {
    text.replace('\t', "    ")
}

/// Syntax-highlighted lines, or `None` when the language is unknown or the
/// highlighter fails.
fn highlighted_lines(text: &str, language: Option<&str>) -> Option<Vec<Vec<HighlightedToken>>> {
    let language = language?;
    match highlighting::highlight_code(text, language) {
        Ok(tokens) => Some(highlighting::split_lines(&tokens)),
        Err(e) => {
            debug!("Rendering {} code without highlighting: {}", language, e);
            None
        }
    }
}

fn plain_lines(text: &str, color: Color) -> Vec<Vec<HighlightedToken>> {
    text.split('\n')
        .map(|line| {
            vec![HighlightedToken {
                text: line.to_string(),
                color,
                bold: false,
                italic: false,
            }]
        })
        .collect()
}

/// Breaks source lines into visual lines that fit `max_width`, keeping
/// leading whitespace. Each visual line is a list of spans.
fn wrap_code_lines(lines: &[Vec<HighlightedToken>], style: &CodeStyle, max_width: f32) -> Vec<Vec<Span>> {
    let char_w = |face: FontFace, c: char| metrics::char_width(face, c) * style.size / 1000.0;
    let mut visual = Vec::new();

    for tokens in lines {
        let mut line: Vec<Span> = Vec::new();
        let mut width = 0.0;
        for token in tokens {
            let face = FontFace::styled(style.family, token.bold, token.italic);
            let mut piece = String::new();
            for ch in expand_tabs(&token.text).chars() {
                let w = char_w(face, ch);
                if width + w > max_width && (width > 0.0 || !piece.is_empty()) {
                    if !piece.is_empty() {
                        line.push(Span::new(std::mem::take(&mut piece), face, style.size, token.color));
                    }
                    visual.push(std::mem::take(&mut line));
                    width = 0.0;
                }
                piece.push(ch);
                width += w;
            }
            if !piece.is_empty() {
                line.push(Span::new(piece, face, style.size, token.color));
            }
        }
        visual.push(line);
    }
    while visual.last().is_some_and(|l: &Vec<Span>| l.is_empty()) {
        visual.pop();
    }
    visual
}

/// Draws visual lines from the cursor down, stopping at the bottom of the
/// bounds.
fn draw_code_lines(canvas: &mut Canvas, lines: &[Vec<Span>], size: f32) {
    let line_height = metrics::line_height(size);
    for line in lines {
        if canvas.remaining() < line_height {
            break;
        }
        let baseline = canvas.cursor() - size * 0.9;
        let mut x = canvas.bounds().x;
        for span in line {
            canvas.draw_text_at(x, baseline, &span.text, span.face, span.size, span.color);
            x += metrics::text_width(&span.text, span.face, span.size);
        }
        canvas.advance(line_height);
    }
}

fn draw_badge(canvas: &mut Canvas, language: &str, box_rect: Rect, style: &CodeStyle) {
    let badge = Rect::new(box_rect.right() - 100.0, box_rect.y - 5.0, 90.0, 18.0);
    canvas.draw_rounded_rect(badge, 3.0, Some(style.badge_fill), None);

    let label = language.to_uppercase();
    let face = FontFace::regular(style.label_family);
    let size = 8.0;
    let width = metrics::text_width(&label, face, size).min(80.0);
    let x = badge.x + 5.0 + (80.0 - width) / 2.0;
    canvas.draw_text_at(x, badge.y - 12.0, &label, face, size, style.badge_text);
}

/// Renders a fenced code block.
///
/// The block is drawn as a rounded box of the estimated height with an inset
/// lighter fill and the code inset by 10pt. Highlighted blocks also get a
/// language badge in the top-right corner. Lines that do not fit inside the
/// box are clipped.
pub fn render_code(
    text: &str,
    language: Option<&str>,
    canvas: &mut Canvas,
    style: &CodeStyle,
) -> Result<(), LayoutError> {
    canvas.advance(10.0);

    let estimated = estimate_code_height(text);
    if needs_page_break(canvas.remaining(), estimated) {
        debug!("Code block of {:.0}pt moved to a new page", estimated);
        canvas.start_new_page();
        canvas.advance(20.0);
    }

    let bounds = canvas.bounds();
    let top = canvas.cursor();
    let outer = Rect::new(bounds.x, top, bounds.width, estimated);
    canvas.draw_rounded_rect(
        outer,
        CORNER_RADIUS,
        Some(style.border),
        Some(Stroke::new(style.border, 1.0)),
    );
    canvas.draw_rounded_rect(
        Rect::new(outer.x + 1.0, top - 1.0, outer.width - 2.0, estimated - 2.0),
        CORNER_RADIUS,
        Some(style.fill),
        None,
    );
    let highlighted = highlighted_lines(text, language);
    if let (Some(lang), Some(_)) = (language, &highlighted) {
        draw_badge(canvas, lang, outer, style);
    }

    let lines = highlighted.unwrap_or_else(|| plain_lines(text, style.text));
    let inner = Rect::new(
        outer.x + TEXT_INSET,
        top - TEXT_INSET,
        outer.width - 2.0 * TEXT_INSET,
        estimated - 2.0 * TEXT_INSET,
    );
    let visual = wrap_code_lines(&lines, style, inner.width);
    canvas.with_bounding_box(inner, |c| {
        draw_code_lines(c, &visual, style.size);
        Ok(())
    })?;

    canvas.advance_to(top - estimated);
    canvas.advance(10.0);
    Ok(())
}

/// Draws a diagram's source in a fixed 100pt box with an italic note
/// beneath the code.
pub fn render_fallback_box(
    source: &str,
    note: &str,
    canvas: &mut Canvas,
    style: &CodeStyle,
) -> Result<(), LayoutError> {
    canvas.ensure_space(100.0);
    let bounds = canvas.bounds();
    let top = canvas.cursor();
    canvas.draw_rounded_rect(
        Rect::new(bounds.x, top, bounds.width, 100.0),
        CORNER_RADIUS,
        None,
        Some(Stroke::new(style.border, 1.0)),
    );

    let inner = Rect::new(bounds.x + 10.0, top - 10.0, bounds.width - 20.0, 80.0);
    let code_face = FontFace::regular(style.family);
    let note_face = FontFace::styled(style.label_family, false, true);
    let result = canvas.with_bounding_box(inner, |c| {
        if !source.is_empty() {
            c.flow_text(
                &[Span::new(expand_tabs(source), code_face, 10.0, style.text)],
                0.0,
                TextFlow::Clip,
            );
        }
        c.advance(5.0);
        c.flow_text(
            &[Span::new(format!("Note: {}", note), note_face, 10.0, style.text)],
            0.0,
            TextFlow::Clip,
        );
        Ok(())
    });
    if let Err(e) = &result {
        warn!("Diagram fallback box could not be drawn: {}", e);
    }

    canvas.advance_to(top - 100.0);
    canvas.advance(10.0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DrawOp;

    fn style() -> CodeStyle {
        CodeStyle {
            family: FontFamily::Courier,
            size: 10.0,
            text: Color::BLACK,
            border: Color::rgb(0xcc, 0xcc, 0xcc),
            fill: Color::rgb(0xf8, 0xf8, 0xf8),
            badge_fill: Color::rgb(0xdd, 0xdd, 0xdd),
            badge_text: Color::rgb(0x66, 0x66, 0x66),
            label_family: FontFamily::Helvetica,
        }
    }

    fn canvas() -> Canvas {
        let mut c = Canvas::new(612.0, 792.0, 72.0);
        c.start_new_page();
        c
    }

    #[test]
    fn test_estimate_floor_and_wrapping() {
        assert_eq!(estimate_code_height("x"), 40.0);
        assert_eq!(estimate_code_height("a\nb"), 44.0);
        assert_eq!(wrapped_line_count(&"y".repeat(80)), 1);
        assert_eq!(wrapped_line_count(&"y".repeat(81)), 2);
        assert_eq!(wrapped_line_count("a\n\nb\n\n"), 3);
    }

    #[test]
    fn test_page_break_policy() {
        assert!(needs_page_break(120.0, 201.0));
        assert!(!needs_page_break(120.0, 200.0));
        assert!(!needs_page_break(150.0, 500.0));
    }

    #[test]
    fn test_large_block_near_bottom_starts_new_page() {
        let mut c = canvas();
        c.advance(720.0 - 72.0 - 120.0);
        let code = "line\n".repeat(30);
        render_code(&code, None, &mut c, &style()).unwrap();
        assert_eq!(c.page_count(), 2);
        assert!(c.pages()[0].ops.is_empty());
        assert!(matches!(c.pages()[1].ops[0], DrawOp::RoundedRect { rect, .. } if rect.y == 720.0 - 20.0));
    }

    #[test]
    fn test_small_block_near_bottom_stays() {
        let mut c = canvas();
        c.advance(720.0 - 72.0 - 60.0);
        render_code("short", None, &mut c, &style()).unwrap();
        assert_eq!(c.page_count(), 1);
    }

    #[test]
    fn test_cursor_moves_past_box() {
        let mut c = canvas();
        render_code("a\nb\nc", Some("rust"), &mut c, &style()).unwrap();
        assert_eq!(c.cursor(), 720.0 - 10.0 - 56.0 - 10.0);
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_badge_and_highlighting() {
        let mut c = canvas();
        render_code("fn main() {}", Some("rust"), &mut c, &style()).unwrap();
        let ops = &c.pages()[0].ops;
        assert!(ops
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, size, .. } if text == "RUST" && *size == 8.0)));
        let code_colors: Vec<Color> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { color, size, .. } if *size == 10.0 => Some(*color),
                _ => None,
            })
            .collect();
        assert!(code_colors.len() > 1);
    }

    #[test]
    fn test_unknown_language_renders_plain() {
        let mut c = canvas();
        render_code("  keep indent", Some("klingon"), &mut c, &style()).unwrap();
        let code = c.pages()[0].ops.iter().find_map(|op| match op {
            DrawOp::Text { text, size, .. } if *size == 10.0 => Some(text.clone()),
            _ => None,
        });
        assert_eq!(code.as_deref(), Some("  keep indent"));
        assert!(!c.pages()[0]
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, .. } if text == "KLINGON")));
        assert!(!c.pages()[0]
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::RoundedRect { rect, .. } if rect.height == 18.0)));
    }

    #[test]
    fn test_long_lines_are_clipped_to_box() {
        let mut c = canvas();
        let code = "z".repeat(300);
        render_code(&code, None, &mut c, &style()).unwrap();
        for op in &c.pages()[0].ops {
            if let DrawOp::Text { x, text, face, size, .. } = op {
                let right = x + metrics::text_width(text, *face, *size);
                assert!(right <= 72.0 + 468.0 - 10.0 + 0.01);
            }
        }
    }

    #[test]
    fn test_fallback_box_layout() {
        let mut c = canvas();
        render_fallback_box("graph TD\nA-->B", "tool missing", &mut c, &style()).unwrap();
        assert_eq!(c.cursor(), 720.0 - 110.0);
        let texts: Vec<String> = c.pages()[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["graph TD", "A-->B", "Note: tool missing"]);
    }
}
