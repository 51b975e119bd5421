//! Block converter: walks block-level markup and drives the canvas.
//!
//! Every block kind has one arm in [`BlockRenderer::render_node`]. Kinds the
//! converter does not know are rendered through their children, so new tags
//! degrade to their text instead of disappearing.

use crate::canvas::{Canvas, Rect, Span, Stroke, TextFlow};
use crate::code::{self, CodeStyle};
use crate::diagram::{self, DiagramChain};
use crate::inline::{self, RunAppearance, StyledRun};
use crate::markup::{MarkupNode, NodeKind};
use crate::metrics::FontFace;
use crate::styling::Theme;
use crate::table::{self, TableGrid, TableStyle};
use crate::LayoutError;
use log::{debug, error, warn};

/// Deepest block nesting the converter follows.
pub const MAX_DEPTH: usize = 64;

const LIST_INDENT: f32 = 18.0;
const PARAGRAPH_GAP: f32 = 8.0;
const ITEM_GAP: f32 = 3.0;
const LIST_GAP: f32 = 5.0;
const LINE_BREAK_GAP: f32 = 5.0;

/// ZapfDingbats check mark and empty box.
const CHECKED_GLYPH: &str = "4";
const UNCHECKED_GLYPH: &str = "o";
const BULLET: &str = "\u{2022}";

pub fn heading_size(level: u8) -> f32 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 18.0,
        _ => 16.0,
    }
}

/// Splits a leading `[ ]`, `[x]` or `[X]` marker off list item text.
/// Returns whether the box is checked and the text after the marker.
///
/// ```
/// use slidepress::blocks::parse_checkbox;
/// assert_eq!(parse_checkbox("[x] Done"), Some((true, "Done")));
/// assert_eq!(parse_checkbox("  [ ]   Todo"), Some((false, "Todo")));
/// assert_eq!(parse_checkbox("[y] nope"), None);
/// assert_eq!(parse_checkbox("plain"), None);
/// ```
pub fn parse_checkbox(text: &str) -> Option<(bool, &str)> {
    let rest = text.trim_start().strip_prefix('[')?;
    let mut chars = rest.chars();
    let checked = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let body = chars.as_str().strip_prefix(']')?;
    Some((checked, body.trim_start()))
}

/// Drops the first `count` characters of the runs' text, and any whitespace
/// directly after them.
fn drop_leading_chars(runs: Vec<StyledRun>, mut count: usize) -> Vec<StyledRun> {
    let mut out = Vec::with_capacity(runs.len());
    let mut trimming = true;
    for run in runs {
        match run {
            StyledRun::Text { text, style } if trimming => {
                let len = text.chars().count();
                if count >= len {
                    count -= len;
                    continue;
                }
                let rest: String = text.chars().skip(count).collect();
                count = 0;
                let rest = rest.trim_start();
                if rest.is_empty() {
                    continue;
                }
                trimming = false;
                out.push(StyledRun::Text {
                    text: rest.to_string(),
                    style,
                });
            }
            other => {
                trimming = false;
                out.push(other);
            }
        }
    }
    out
}

/// Child kinds of a list item that are laid out as blocks of their own
/// rather than as part of the item's text line.
fn is_nested_block(node: &MarkupNode) -> bool {
    matches!(
        node.kind,
        NodeKind::List { .. } | NodeKind::CodeBlock { .. } | NodeKind::Table | NodeKind::Heading(_)
    )
}

pub struct BlockRenderer<'a> {
    theme: &'a Theme,
    diagrams: &'a DiagramChain,
}

impl<'a> BlockRenderer<'a> {
    pub fn new(theme: &'a Theme, diagrams: &'a DiagramChain) -> Self {
        Self { theme, diagrams }
    }

    /// Renders a sequence of blocks. A block that fails is replaced by a
    /// one-line annotation and the remaining blocks still render.
    pub fn render_blocks(&self, nodes: &[MarkupNode], canvas: &mut Canvas) {
        for node in nodes {
            if let Err(e) = self.render_block(node, canvas) {
                warn!("Block failed to render: {}", e);
                self.annotate_error(&e, canvas);
            }
            if canvas.depth() != 0 {
                error!(
                    "{} bounding boxes still open after a block, resetting",
                    canvas.depth()
                );
                canvas.reset_bounds();
            }
        }
    }

    pub fn render_block(&self, node: &MarkupNode, canvas: &mut Canvas) -> Result<(), LayoutError> {
        self.render_node(node, canvas, 0)
    }

    fn annotate_error(&self, err: &LayoutError, canvas: &mut Canvas) {
        let face = FontFace::styled(self.theme.fonts.body, false, true);
        let span = Span::new(
            format!("Error rendering block: {}", err),
            face,
            self.theme.sizes.body,
            self.theme.colors.text,
        );
        canvas.flow_text(&[span], 0.0, TextFlow::Paginate);
        canvas.advance(LINE_BREAK_GAP);
    }

    fn render_node(&self, node: &MarkupNode, canvas: &mut Canvas, depth: usize) -> Result<(), LayoutError> {
        if depth > MAX_DEPTH {
            return Err(LayoutError::NestingTooDeep(depth));
        }
        match &node.kind {
            NodeKind::Heading(level) => self.render_heading(node, *level, canvas),
            NodeKind::Paragraph => self.render_paragraph(node, canvas),
            NodeKind::List { ordered, start } => self.render_list(node, *ordered, *start, canvas, depth),
            NodeKind::ListItem => {
                self.render_item(node, None, canvas, depth)?;
                canvas.advance(LIST_GAP);
                Ok(())
            }
            NodeKind::Table => {
                table::render_table(&TableGrid::from_node(node), canvas, &self.table_style());
                Ok(())
            }
            NodeKind::CodeBlock { language } => {
                let text = node.text_content();
                match language.as_deref() {
                    Some(lang) if lang.trim().eq_ignore_ascii_case("mermaid") => {
                        self.render_diagram(&text, canvas)
                    }
                    lang => code::render_code(&text, lang, canvas, &self.code_style()),
                }
            }
            NodeKind::LineBreak => {
                canvas.advance(LINE_BREAK_GAP);
                Ok(())
            }
            NodeKind::Text(_) | NodeKind::Bold | NodeKind::Italic | NodeKind::InlineCode => {
                let mut runs = Vec::new();
                inline::format_node(node, Default::default(), &mut runs);
                inline::trim_runs(&mut runs);
                if !runs.is_empty() {
                    let spans = inline::to_spans(&runs, &self.look(self.theme.sizes.body, false));
                    canvas.flow_text(&spans, 0.0, TextFlow::Paginate);
                }
                Ok(())
            }
            NodeKind::Unknown(tag) if tag == "hr" => {
                self.render_rule(canvas);
                Ok(())
            }
            NodeKind::Unknown(tag) => {
                debug!("Rendering children of <{}>", tag);
                for child in &node.children {
                    self.render_node(child, canvas, depth + 1)?;
                }
                Ok(())
            }
            // Rows and cells outside a table: show their text.
            NodeKind::TableRow | NodeKind::TableCell { .. } => {
                for child in &node.children {
                    self.render_node(child, canvas, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn look(&self, size: f32, heading: bool) -> RunAppearance {
        let colors = &self.theme.colors;
        RunAppearance {
            family: if heading {
                self.theme.fonts.heading
            } else {
                self.theme.fonts.body
            },
            code_family: self.theme.fonts.code,
            size,
            color: if heading { colors.primary } else { colors.text },
            code_color: if heading {
                colors.primary
            } else {
                self.theme.boxes.inline_code
            },
            force_bold: heading,
        }
    }

    pub fn code_style(&self) -> CodeStyle {
        CodeStyle {
            family: self.theme.fonts.code,
            size: self.theme.sizes.code,
            text: self.theme.colors.text,
            border: self.theme.boxes.border,
            fill: self.theme.boxes.code_fill,
            badge_fill: self.theme.boxes.badge_fill,
            badge_text: self.theme.boxes.badge_text,
            label_family: self.theme.fonts.body,
        }
    }

    pub fn table_style(&self) -> TableStyle {
        TableStyle {
            family: self.theme.fonts.body,
            size: self.theme.sizes.table,
            text: self.theme.colors.text,
            border: self.theme.boxes.border,
            header_fill: self.theme.boxes.table_header_fill,
            border_width: 1.0,
            padding: (5.0, 8.0),
        }
    }

    fn render_heading(&self, node: &MarkupNode, level: u8, canvas: &mut Canvas) -> Result<(), LayoutError> {
        let size = heading_size(level);
        if !canvas.at_top() {
            canvas.advance(10.0 * size / 16.0);
        }
        let runs = inline::format(node);
        let spans = inline::to_spans(&runs, &self.look(size, true));
        canvas.flow_text(&spans, 0.0, TextFlow::Paginate);
        canvas.advance(8.0 * size / 16.0);
        Ok(())
    }

    fn render_paragraph(&self, node: &MarkupNode, canvas: &mut Canvas) -> Result<(), LayoutError> {
        let runs = inline::format(node);
        if !runs.is_empty() {
            let spans = inline::to_spans(&runs, &self.look(self.theme.sizes.paragraph, false));
            canvas.flow_text(&spans, 0.0, TextFlow::Paginate);
        }
        canvas.advance(PARAGRAPH_GAP);
        Ok(())
    }

    fn render_list(
        &self,
        node: &MarkupNode,
        ordered: bool,
        start: u64,
        canvas: &mut Canvas,
        depth: usize,
    ) -> Result<(), LayoutError> {
        let items = node.children.iter().filter(|c| c.kind == NodeKind::ListItem);
        for (i, item) in items.enumerate() {
            let number = ordered.then(|| start + i as u64);
            self.render_item(item, number, canvas, depth + 1)?;
        }
        canvas.advance(LIST_GAP);
        Ok(())
    }

    /// Renders one item: its marker and text on a line, then any nested
    /// blocks beneath it. Nested lists are indented.
    fn render_item(
        &self,
        item: &MarkupNode,
        number: Option<u64>,
        canvas: &mut Canvas,
        depth: usize,
    ) -> Result<(), LayoutError> {
        let mut runs = Vec::new();
        for child in item.children.iter().filter(|c| !is_nested_block(c)) {
            inline::format_node(child, Default::default(), &mut runs);
        }
        inline::trim_runs(&mut runs);

        let look = self.look(self.theme.sizes.list, false);
        let text_face = FontFace::regular(look.family);
        let plain = inline::plain_text(&runs);
        let (marker, runs) = match (parse_checkbox(&plain), number) {
            (Some((checked, body)), _) => {
                let prefix = plain.chars().count() - body.chars().count();
                let glyph = if checked { CHECKED_GLYPH } else { UNCHECKED_GLYPH };
                (
                    Span::new(glyph, FontFace::Dingbats, look.size, look.color),
                    drop_leading_chars(runs, prefix),
                )
            }
            (None, Some(n)) => (Span::new(format!("{}.", n), text_face, look.size, look.color), runs),
            (None, None) => (Span::new(BULLET, text_face, look.size, look.color), runs),
        };

        let mut spans = vec![marker, Span::new(" ", text_face, look.size, look.color)];
        spans.extend(inline::to_spans(&runs, &look));
        canvas.flow_text(&spans, 0.0, TextFlow::Paginate);
        canvas.advance(ITEM_GAP);

        for child in item.children.iter().filter(|c| is_nested_block(c)) {
            if matches!(child.kind, NodeKind::List { .. }) {
                self.render_indented(child, canvas, depth + 1)?;
            } else {
                self.render_node(child, canvas, depth + 1)?;
            }
        }
        Ok(())
    }

    fn render_indented(&self, node: &MarkupNode, canvas: &mut Canvas, depth: usize) -> Result<(), LayoutError> {
        canvas.ensure_space(1.0);
        let bounds = canvas.bounds();
        let rect = Rect::new(
            bounds.x + LIST_INDENT,
            canvas.cursor(),
            bounds.width - LIST_INDENT,
            canvas.remaining(),
        );
        canvas.with_bounding_box(rect, |c| self.render_node(node, c, depth))
    }

    fn render_rule(&self, canvas: &mut Canvas) {
        canvas.advance(LINE_BREAK_GAP);
        let bounds = canvas.bounds();
        let y = canvas.cursor();
        canvas.draw_line(
            (bounds.x, y),
            (bounds.right(), y),
            Stroke::new(self.theme.boxes.border, 1.0),
        );
        canvas.advance(LINE_BREAK_GAP);
    }

    fn render_diagram(&self, source: &str, canvas: &mut Canvas) -> Result<(), LayoutError> {
        canvas.advance(10.0);
        let label = Span::new(
            "Mermaid Diagram:",
            FontFace::styled(self.theme.fonts.body, true, false),
            self.theme.sizes.body,
            self.theme.colors.text,
        );
        canvas.flow_text(&[label], 0.0, TextFlow::Paginate);
        canvas.advance(5.0);

        let result = self.diagrams.render(source);
        diagram::place_diagram(&result, canvas, &self.code_style())
    }
}
