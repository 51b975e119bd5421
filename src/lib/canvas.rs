//! The drawing surface the layout engine writes to.
//!
//! Coordinates are PDF points with the origin at the bottom-left of the page,
//! so the cursor starts near the top and decreases as content is laid out.
//! Nothing here touches PDF syntax: every primitive appends a [`DrawOp`] to
//! the current [`Page`], and the writer in [`crate::pdf`] turns the finished
//! page list into a document.

use crate::metrics::{self, FontFace};
use crate::styling::Color;
use crate::LayoutError;
use log::{debug, warn};
use std::path::PathBuf;

/// A rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y - self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raster,
    Svg,
}

/// An image referenced by path. The bytes are read when the PDF is
/// assembled, so the file must outlive the render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub path: PathBuf,
    pub kind: ImageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// A single line of text; `y` is the baseline.
    Text {
        x: f32,
        y: f32,
        text: String,
        face: FontFace,
        size: f32,
        color: Color,
    },
    Rect {
        rect: Rect,
        fill: Option<Color>,
        stroke: Option<Stroke>,
    },
    RoundedRect {
        rect: Rect,
        radius: f32,
        fill: Option<Color>,
        stroke: Option<Stroke>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
    },
    Image {
        rect: Rect,
        image: ImageRef,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub background: Option<Color>,
    pub ops: Vec<DrawOp>,
}

/// What happens when flowing text reaches the bottom of the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFlow {
    /// Continue on a new page.
    Paginate,
    /// Drop the remaining lines.
    Clip,
}

/// A piece of text in one face, size and color.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub face: FontFace,
    pub size: f32,
    pub color: Color,
}

impl Span {
    pub fn new(text: impl Into<String>, face: FontFace, size: f32, color: Color) -> Self {
        Self {
            text: text.into(),
            face,
            size,
            color,
        }
    }
}

/// Draws per-page chrome (headers, footers, backgrounds) and reports the
/// area left for content.
pub trait PageDecorator {
    fn decorate(&self, canvas: &mut Canvas, page_number: usize) -> Rect;
}

struct SavedBounds {
    bounds: Rect,
    page: usize,
}

pub struct Canvas {
    page_width: f32,
    page_height: f32,
    margin: f32,
    background: Option<Color>,
    pages: Vec<Page>,
    bounds: Rect,
    content_area: Rect,
    cursor: f32,
    stack: Vec<SavedBounds>,
    decorator: Option<Box<dyn PageDecorator>>,
}

impl Canvas {
    pub fn new(page_width: f32, page_height: f32, margin: f32) -> Self {
        let content_area = Rect::new(
            margin,
            page_height - margin,
            page_width - 2.0 * margin,
            page_height - 2.0 * margin,
        );
        Self {
            page_width,
            page_height,
            margin,
            background: None,
            pages: Vec::new(),
            bounds: content_area,
            content_area,
            cursor: content_area.y,
            stack: Vec::new(),
            decorator: None,
        }
    }

    pub fn set_decorator(&mut self, decorator: Box<dyn PageDecorator>) {
        self.decorator = Some(decorator);
    }

    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    pub fn page_size(&self) -> (f32, f32) {
        (self.page_width, self.page_height)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of bounding boxes currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Space left between the cursor and the bottom of the bounds.
    pub fn remaining(&self) -> f32 {
        self.cursor - self.bounds.bottom()
    }

    /// Whether nothing has been laid out below the top of the bounds yet.
    pub fn at_top(&self) -> bool {
        (self.cursor - self.bounds.y).abs() < f32::EPSILON
    }

    /// Moves the cursor down. Negative distances are ignored so the cursor
    /// never moves back up the page.
    pub fn advance(&mut self, dy: f32) {
        if dy > 0.0 && dy.is_finite() {
            self.cursor -= dy;
        }
    }

    /// Moves the cursor down to `y` if it is above it.
    pub fn advance_to(&mut self, y: f32) {
        if y < self.cursor {
            self.cursor = y;
        }
    }

    /// Starts a fresh page and places the cursor at the top of its content
    /// area. Open bounding boxes keep their horizontal extent and are
    /// stretched over the new page's content area.
    pub fn start_new_page(&mut self) {
        self.pages.push(Page {
            width: self.page_width,
            height: self.page_height,
            background: self.background,
            ops: Vec::new(),
        });
        let page_number = self.pages.len();

        let mut area = match self.decorator.take() {
            Some(decorator) => {
                let area = decorator.decorate(self, page_number);
                self.decorator = Some(decorator);
                area
            }
            None => self.default_content_area(),
        };
        if !area.is_valid() {
            warn!(
                "Page content area {}x{} is not usable, falling back to page margins",
                area.width, area.height
            );
            area = self.default_content_area();
        }
        self.content_area = area;

        self.bounds = if self.stack.is_empty() {
            area
        } else {
            Self::reanchor(self.bounds, area)
        };
        self.cursor = self.bounds.y;
        debug!("Started page {}", page_number);
    }

    fn default_content_area(&self) -> Rect {
        Rect::new(
            self.margin,
            self.page_height - self.margin,
            self.page_width - 2.0 * self.margin,
            self.page_height - 2.0 * self.margin,
        )
    }

    fn reanchor(rect: Rect, area: Rect) -> Rect {
        Rect::new(rect.x, area.y, rect.width, area.height)
    }

    /// Starts a new page when fewer than `height` points remain. Returns
    /// whether a page was started. A page that is still empty is never
    /// abandoned, since the content would not fit on the next one either.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.pages.is_empty() {
            self.start_new_page();
            return true;
        }
        if self.remaining() < height && !self.at_top() {
            self.start_new_page();
            return true;
        }
        false
    }

    /// Runs `body` with the bounds narrowed to `rect` and restores the prior
    /// bounds afterwards, whether `body` succeeds or fails. The cursor is
    /// left where `body` put it.
    pub fn with_bounding_box<T, F>(&mut self, rect: Rect, body: F) -> Result<T, LayoutError>
    where
        F: FnOnce(&mut Canvas) -> Result<T, LayoutError>,
    {
        if !rect.is_valid() {
            return Err(LayoutError::InvalidBounds {
                width: rect.width,
                height: rect.height,
            });
        }
        if self.pages.is_empty() {
            self.start_new_page();
        }

        self.stack.push(SavedBounds {
            bounds: self.bounds,
            page: self.pages.len(),
        });
        self.bounds = rect;
        self.advance_to(rect.y);

        let result = body(self);

        if let Some(saved) = self.stack.pop() {
            self.bounds = if saved.page == self.pages.len() {
                saved.bounds
            } else {
                Self::reanchor(saved.bounds, self.content_area)
            };
        }
        result
    }

    /// Drops every open bounding box and returns to the page content area.
    pub fn reset_bounds(&mut self) {
        self.stack.clear();
        self.bounds = self.content_area;
        if self.cursor > self.bounds.y {
            self.cursor = self.bounds.y;
        }
    }

    fn push(&mut self, op: DrawOp) {
        if self.pages.is_empty() {
            self.start_new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    /// Draws a single line of text with its baseline at `y`.
    pub fn draw_text_at(&mut self, x: f32, y: f32, text: &str, face: FontFace, size: f32, color: Color) {
        if text.is_empty() {
            return;
        }
        self.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
            face,
            size,
            color,
        });
    }

    pub fn draw_rect(&mut self, rect: Rect, fill: Option<Color>, stroke: Option<Stroke>) {
        self.push(DrawOp::Rect { rect, fill, stroke });
    }

    pub fn draw_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f32,
        fill: Option<Color>,
        stroke: Option<Stroke>,
    ) {
        let radius = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        self.push(DrawOp::RoundedRect {
            rect,
            radius,
            fill,
            stroke,
        });
    }

    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) {
        self.push(DrawOp::Line { from, to, stroke });
    }

    pub fn draw_image(&mut self, rect: Rect, image: ImageRef) {
        self.push(DrawOp::Image { rect, image });
    }

    /// Lays out `spans` as wrapped lines starting at the cursor, `indent`
    /// points in from the left of the bounds. A `\n` in a span forces a line
    /// break. Returns the number of lines drawn.
    pub fn flow_text(&mut self, spans: &[Span], indent: f32, flow: TextFlow) -> usize {
        if self.pages.is_empty() {
            self.start_new_page();
        }
        let lines = self.break_lines(spans, indent);
        let mut drawn = 0;

        for line in lines {
            let size = line.size;
            let height = metrics::line_height(size);
            if self.cursor - height < self.bounds.bottom() - 0.01 {
                match flow {
                    TextFlow::Clip => {
                        self.cursor = self.bounds.bottom().min(self.cursor);
                        break;
                    }
                    TextFlow::Paginate => {
                        if !self.at_top() {
                            self.start_new_page();
                        }
                    }
                }
            }

            let baseline = self.cursor - size * 0.8 - (height - size) / 2.0;
            let mut x = self.bounds.x + indent;
            for piece in line.pieces {
                let width = metrics::text_width(&piece.text, piece.face, piece.size);
                self.draw_text_at(x, baseline, &piece.text, piece.face, piece.size, piece.color);
                x += width;
            }
            self.cursor -= height;
            drawn += 1;
        }
        drawn
    }

    fn break_lines(&self, spans: &[Span], indent: f32) -> Vec<Line> {
        let max_width = (self.bounds.width - indent).max(1.0);
        let mut builder = LineBuilder::new(max_width);
        for span in spans {
            builder.size = builder.size.max(span.size);
            for (i, segment) in span.text.split('\n').enumerate() {
                if i > 0 {
                    builder.finish_line(span.size);
                }
                builder.push_segment(segment, span);
            }
        }
        builder.finish()
    }
}

struct Line {
    size: f32,
    pieces: Vec<Span>,
}

/// Greedy line breaker over mixed-style spans.
struct LineBuilder {
    max_width: f32,
    width: f32,
    size: f32,
    pending_space: Option<Span>,
    pieces: Vec<Span>,
    lines: Vec<Line>,
}

impl LineBuilder {
    fn new(max_width: f32) -> Self {
        Self {
            max_width,
            width: 0.0,
            size: 0.0,
            pending_space: None,
            pieces: Vec::new(),
            lines: Vec::new(),
        }
    }

    fn push_segment(&mut self, segment: &str, span: &Span) {
        let mut word = String::new();
        for ch in segment.chars() {
            if ch.is_whitespace() {
                if !word.is_empty() {
                    self.push_word(&std::mem::take(&mut word), span);
                }
                if !self.pieces.is_empty() {
                    self.pending_space = Some(Span::new(" ", span.face, span.size, span.color));
                }
            } else {
                word.push(ch);
            }
        }
        if !word.is_empty() {
            self.push_word(&word, span);
        }
    }

    fn push_word(&mut self, word: &str, span: &Span) {
        let word_width = metrics::text_width(word, span.face, span.size);
        let space_width = self
            .pending_space
            .as_ref()
            .map(|s| metrics::text_width(&s.text, s.face, s.size))
            .unwrap_or(0.0);

        if !self.pieces.is_empty() && self.width + space_width + word_width > self.max_width {
            self.finish_line(span.size);
        }

        if word_width > self.max_width {
            let pieces = metrics::split_long_word(word, span.face, span.size, self.max_width);
            let count = pieces.len();
            for (i, piece) in pieces.into_iter().enumerate() {
                self.append(Span::new(piece, span.face, span.size, span.color));
                if i + 1 < count {
                    self.finish_line(span.size);
                }
            }
            return;
        }

        if let Some(space) = self.pending_space.take() {
            if !self.pieces.is_empty() {
                self.append(space);
            }
        }
        self.append(Span::new(word, span.face, span.size, span.color));
    }

    fn append(&mut self, span: Span) {
        self.width += metrics::text_width(&span.text, span.face, span.size);
        self.size = self.size.max(span.size);
        if let Some(last) = self.pieces.last_mut() {
            if last.face == span.face && last.size == span.size && last.color == span.color {
                last.text.push_str(&span.text);
                return;
            }
        }
        self.pieces.push(span);
    }

    fn finish_line(&mut self, fallback_size: f32) {
        let size = if self.pieces.is_empty() {
            fallback_size
        } else {
            self.size
        };
        self.lines.push(Line {
            size,
            pieces: std::mem::take(&mut self.pieces),
        });
        self.width = 0.0;
        self.size = 0.0;
        self.pending_space = None;
    }

    fn finish(mut self) -> Vec<Line> {
        if !self.pieces.is_empty() {
            let size = self.size;
            self.finish_line(size);
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styling::FontFamily;

    fn helv() -> FontFace {
        FontFace::regular(FontFamily::Helvetica)
    }

    fn canvas() -> Canvas {
        let mut c = Canvas::new(612.0, 792.0, 72.0);
        c.start_new_page();
        c
    }

    #[test]
    fn test_new_page_places_cursor_at_content_top() {
        let c = canvas();
        assert_eq!(c.page_count(), 1);
        assert_eq!(c.cursor(), 720.0);
        assert_eq!(c.bounds(), Rect::new(72.0, 720.0, 468.0, 648.0));
        assert_eq!(c.bounds().bottom(), 72.0);
    }

    #[test]
    fn test_advance_never_moves_up() {
        let mut c = canvas();
        c.advance(10.0);
        c.advance(-50.0);
        c.advance_to(800.0);
        assert_eq!(c.cursor(), 710.0);
    }

    #[test]
    fn test_bounding_box_restores_bounds_on_success_and_error() {
        let mut c = canvas();
        let before = c.bounds();

        let inner = Rect::new(100.0, 700.0, 200.0, 100.0);
        let seen = c
            .with_bounding_box(inner, |c| Ok(c.bounds()))
            .unwrap();
        assert_eq!(seen, inner);
        assert_eq!(c.bounds(), before);
        assert_eq!(c.depth(), 0);

        let result: Result<(), LayoutError> = c.with_bounding_box(inner, |c| {
            c.with_bounding_box(Rect::new(110.0, 690.0, 50.0, 50.0), |_| {
                Err(LayoutError::TableOverflow("boom".to_string()))
            })
        });
        assert!(result.is_err());
        assert_eq!(c.bounds(), before);
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_invalid_bounding_box_is_reported() {
        let mut c = canvas();
        let result = c.with_bounding_box(Rect::new(0.0, 100.0, 0.0, 10.0), |_| Ok(()));
        assert!(matches!(result, Err(LayoutError::InvalidBounds { .. })));
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_page_break_inside_box_keeps_horizontal_extent() {
        let mut c = canvas();
        let outer = c.bounds();
        let rect = Rect::new(90.0, c.cursor(), 400.0, c.remaining());
        c.with_bounding_box(rect, |c| {
            c.start_new_page();
            assert_eq!(c.bounds().x, 90.0);
            assert_eq!(c.bounds().width, 400.0);
            assert_eq!(c.bounds().y, 720.0);
            Ok(())
        })
        .unwrap();
        assert_eq!(c.bounds(), outer);
        assert_eq!(c.page_count(), 2);
    }

    #[test]
    fn test_flow_text_wraps_and_paginates() {
        let mut c = canvas();
        let text = "word ".repeat(2000);
        let lines = c.flow_text(&[Span::new(text, helv(), 12.0, Color::BLACK)], 0.0, TextFlow::Paginate);
        assert!(lines > 40);
        assert!(c.page_count() > 1);
        for page in c.pages() {
            for op in &page.ops {
                if let DrawOp::Text { x, text, .. } = op {
                    let w = metrics::text_width(text, helv(), 12.0);
                    assert!(*x + w <= 72.0 + 468.0 + 0.01);
                }
            }
        }
    }

    #[test]
    fn test_flow_text_clips_inside_box() {
        let mut c = canvas();
        let text = "line\n".repeat(50);
        let rect = Rect::new(72.0, 700.0, 200.0, 60.0);
        let drawn = c
            .with_bounding_box(rect, |c| {
                Ok(c.flow_text(&[Span::new(text, helv(), 10.0, Color::BLACK)], 0.0, TextFlow::Clip))
            })
            .unwrap();
        assert_eq!(drawn, 5);
        assert_eq!(c.page_count(), 1);
    }

    #[test]
    fn test_flow_text_merges_pieces_of_same_style() {
        let mut c = canvas();
        let bold = FontFace::styled(FontFamily::Helvetica, true, false);
        c.flow_text(
            &[
                Span::new("Hello ", helv(), 12.0, Color::BLACK),
                Span::new("big", bold, 12.0, Color::BLACK),
                Span::new(" world", helv(), 12.0, Color::BLACK),
            ],
            0.0,
            TextFlow::Paginate,
        );
        let texts: Vec<&str> = c.pages()[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Hello ", "big", " world"]);
    }

    struct Chrome;

    impl PageDecorator for Chrome {
        fn decorate(&self, canvas: &mut Canvas, page_number: usize) -> Rect {
            canvas.draw_text_at(10.0, 780.0, &page_number.to_string(), FontFace::regular(FontFamily::Helvetica), 10.0, Color::BLACK);
            Rect::new(50.0, 700.0, 500.0, 600.0)
        }
    }

    #[test]
    fn test_decorator_sets_content_area() {
        let mut c = Canvas::new(612.0, 792.0, 72.0);
        c.set_decorator(Box::new(Chrome));
        c.start_new_page();
        assert_eq!(c.bounds(), Rect::new(50.0, 700.0, 500.0, 600.0));
        assert_eq!(c.pages()[0].ops.len(), 1);
    }

    #[test]
    fn test_ensure_space_does_not_abandon_empty_page() {
        let mut c = canvas();
        assert!(!c.ensure_space(10_000.0));
        c.advance(10.0);
        assert!(c.ensure_space(10_000.0));
        assert_eq!(c.page_count(), 2);
    }
}
