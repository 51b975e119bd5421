//! The document model handed to the layout engine.
//!
//! A [`Presentation`] is a list of [`Slide`]s; each slide owns a sequence of
//! block-level [`MarkupNode`] trees. The tag set is closed: anything the
//! parser does not map onto a known kind becomes [`NodeKind::Unknown`] and the
//! renderer simply walks its children.

/// The kind of a markup node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Leaf text. Text nodes never have children.
    Text(String),
    /// Heading with level 1 (largest) to 6.
    Heading(u8),
    Paragraph,
    List { ordered: bool, start: u64 },
    ListItem,
    Table,
    TableRow,
    TableCell { header: bool },
    /// Fenced or indented code; the code text is the single Text child.
    CodeBlock { language: Option<String> },
    InlineCode,
    Bold,
    Italic,
    LineBreak,
    /// Any other element, carrying the tag name it was parsed from.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupNode {
    pub kind: NodeKind,
    pub children: Vec<MarkupNode>,
}

impl MarkupNode {
    pub fn new(kind: NodeKind, children: Vec<MarkupNode>) -> Self {
        Self { kind, children }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(content.into()), Vec::new())
    }

    pub fn heading(level: u8, children: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::Heading(level.clamp(1, 6)), children)
    }

    pub fn paragraph(children: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::Paragraph, children)
    }

    pub fn bold(children: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::Bold, children)
    }

    pub fn italic(children: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::Italic, children)
    }

    pub fn inline_code(code: impl Into<String>) -> Self {
        Self::new(NodeKind::InlineCode, vec![Self::text(code)])
    }

    pub fn line_break() -> Self {
        Self::new(NodeKind::LineBreak, Vec::new())
    }

    pub fn list(ordered: bool, items: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::List { ordered, start: 1 }, items)
    }

    pub fn list_item(children: Vec<MarkupNode>) -> Self {
        Self::new(NodeKind::ListItem, children)
    }

    pub fn code_block(language: Option<&str>, code: impl Into<String>) -> Self {
        Self::new(
            NodeKind::CodeBlock {
                language: language.map(str::to_string),
            },
            vec![Self::text(code)],
        )
    }

    /// Builds a table from rows of cell strings. When `header` is set the
    /// first row's cells are header cells.
    pub fn table(rows: &[&[&str]], header: bool) -> Self {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| {
                let cells = cells
                    .iter()
                    .map(|c| {
                        Self::new(
                            NodeKind::TableCell {
                                header: header && i == 0,
                            },
                            vec![Self::text(*c)],
                        )
                    })
                    .collect();
                Self::new(NodeKind::TableRow, cells)
            })
            .collect();
        Self::new(NodeKind::Table, rows)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    /// Concatenated text of this node and all descendants, without styling.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::LineBreak => out.push('\n'),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Depth-first visit of this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a MarkupNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// One slide: its content blocks and optional speaker notes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slide {
    pub content: Vec<MarkupNode>,
    pub notes: Option<Vec<MarkupNode>>,
    pub raw_content: String,
}

impl Slide {
    pub fn has_notes(&self) -> bool {
        self.notes.as_ref().is_some_and(|n| !n.is_empty())
    }

    /// Text of the first heading on the slide, if any.
    pub fn title(&self) -> Option<String> {
        let mut found = None;
        for block in &self.content {
            block.walk(&mut |node| {
                if found.is_none() && matches!(node.kind, NodeKind::Heading(_)) {
                    found = Some(node.text_content().trim().to_string());
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub date: String,
    /// Theme file named in the front matter, if any.
    pub theme: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: "Untitled Presentation".to_string(),
            author: "Unknown Author".to_string(),
            date: chrono::Local::now().date_naive().to_string(),
            theme: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    pub metadata: Metadata,
    pub slides: Vec<Slide>,
}

impl Presentation {
    pub fn has_notes(&self) -> bool {
        self.slides.iter().any(Slide::has_notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_flattens_inline_markup() {
        let node = MarkupNode::paragraph(vec![
            MarkupNode::text("Hello "),
            MarkupNode::bold(vec![MarkupNode::text("bold")]),
            MarkupNode::line_break(),
            MarkupNode::inline_code("x"),
        ]);
        assert_eq!(node.text_content(), "Hello bold\nx");
    }

    #[test]
    fn test_slide_title_is_first_heading() {
        let slide = Slide {
            content: vec![
                MarkupNode::paragraph(vec![MarkupNode::text("intro")]),
                MarkupNode::heading(2, vec![MarkupNode::text(" Agenda ")]),
                MarkupNode::heading(1, vec![MarkupNode::text("Later")]),
            ],
            ..Default::default()
        };
        assert_eq!(slide.title().as_deref(), Some("Agenda"));
    }

    #[test]
    fn test_heading_level_is_clamped() {
        assert_eq!(MarkupNode::heading(9, vec![]).kind, NodeKind::Heading(6));
        assert_eq!(MarkupNode::heading(0, vec![]).kind, NodeKind::Heading(1));
    }

    #[test]
    fn test_table_builder_marks_header_row() {
        let table = MarkupNode::table(&[&["a", "b"], &["1", "2"]], true);
        assert_eq!(table.children.len(), 2);
        assert_eq!(
            table.children[0].children[0].kind,
            NodeKind::TableCell { header: true }
        );
        assert_eq!(
            table.children[1].children[0].kind,
            NodeKind::TableCell { header: false }
        );
    }
}
