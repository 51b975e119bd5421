//! Inline formatting: flattens an inline markup subtree into styled runs.

use crate::canvas::Span;
use crate::markup::{MarkupNode, NodeKind};
use crate::metrics::FontFace;
use crate::styling::{Color, FontFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyledRun {
    Text { text: String, style: RunStyle },
    /// Forced line break inside the paragraph.
    Break,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        StyledRun::Text {
            text: text.into(),
            style: RunStyle::default(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            StyledRun::Text { text, .. } => text,
            StyledRun::Break => "\n",
        }
    }
}

/// Formats the inline children of `node` in document order.
///
/// Whitespace between runs collapses to a single space; whitespace at the
/// edges of the block is dropped. Nested block nodes that show up inline (a
/// paragraph inside a list item, say) contribute their inline content.
pub fn format(node: &MarkupNode) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    for child in &node.children {
        format_node(child, RunStyle::default(), &mut runs);
    }
    trim_runs(&mut runs);
    runs
}

fn is_blank(run: &StyledRun) -> bool {
    matches!(run, StyledRun::Text { text, style } if !style.code && text.trim().is_empty())
}

/// Drops whitespace-only runs at the start and end of a block and on either
/// side of a forced break.
pub fn trim_runs(runs: &mut Vec<StyledRun>) {
    let mut kept: Vec<StyledRun> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        if is_blank(&run) && matches!(kept.last(), None | Some(StyledRun::Break)) {
            continue;
        }
        if matches!(run, StyledRun::Break) {
            while kept.last().is_some_and(is_blank) {
                kept.pop();
            }
        }
        kept.push(run);
    }
    while kept.last().is_some_and(is_blank) {
        kept.pop();
    }
    *runs = kept;
}

/// Formats `node` itself as well as its children. Edge whitespace is left
/// in place; see [`trim_runs`].
pub fn format_node(node: &MarkupNode, style: RunStyle, runs: &mut Vec<StyledRun>) {
    match &node.kind {
        NodeKind::Text(text) => {
            if text.is_empty() {
                return;
            }
            let text = if text.trim().is_empty() { " " } else { text.as_str() };
            runs.push(StyledRun::Text {
                text: text.to_string(),
                style,
            });
        }
        NodeKind::Bold => format_children(node, RunStyle { bold: true, ..style }, runs),
        NodeKind::Italic => format_children(node, RunStyle { italic: true, ..style }, runs),
        NodeKind::InlineCode => {
            let text = node.text_content();
            if !text.is_empty() {
                runs.push(StyledRun::Text {
                    text,
                    style: RunStyle { code: true, ..style },
                });
            }
        }
        NodeKind::LineBreak => runs.push(StyledRun::Break),
        _ => format_children(node, style, runs),
    }
}

fn format_children(node: &MarkupNode, style: RunStyle, runs: &mut Vec<StyledRun>) {
    for child in &node.children {
        format_node(child, style, runs);
    }
}

/// Concatenated text of the runs, with breaks as newlines.
pub fn plain_text(runs: &[StyledRun]) -> String {
    runs.iter().map(StyledRun::text).collect()
}

/// How runs map onto faces and colors.
#[derive(Debug, Clone, Copy)]
pub struct RunAppearance {
    pub family: FontFamily,
    pub code_family: FontFamily,
    pub size: f32,
    pub color: Color,
    pub code_color: Color,
    /// Makes every run bold, as in headings and table headers.
    pub force_bold: bool,
}

/// Turns styled runs into canvas spans.
pub fn to_spans(runs: &[StyledRun], look: &RunAppearance) -> Vec<Span> {
    runs.iter()
        .map(|run| match run {
            StyledRun::Break => Span::new("\n", FontFace::regular(look.family), look.size, look.color),
            StyledRun::Text { text, style } => {
                let bold = style.bold || look.force_bold;
                if style.code {
                    Span::new(
                        text.clone(),
                        FontFace::styled(look.code_family, bold, style.italic),
                        look.size,
                        look.code_color,
                    )
                } else {
                    Span::new(
                        text.clone(),
                        FontFace::styled(look.family, bold, style.italic),
                        look.size,
                        look.color,
                    )
                }
            }
        })
        .collect()
}
