//! Markdown deck parsing.
//!
//! A deck is a markdown file with optional YAML front matter. Slides are
//! introduced by a line reading `---slide`; a `---notes` line turns the rest
//! of the current slide into speaker notes:
//!
//! ```text
//! ---
//! title: "Quarterly review"
//! author: "Ops team"
//! ---
//!
//! ---slide
//! # Welcome
//! - [x] shipped
//! - [ ] pending
//!
//! ---notes
//! Mention the release date.
//! ```
//!
//! Slide bodies go through `pulldown-cmark` and come out as [`MarkupNode`]
//! trees. Task lists are deliberately not enabled: `[ ]` and `[x]` stay
//! literal text so the block converter can turn them into checkbox glyphs.

use crate::markup::{Metadata, MarkupNode, NodeKind, Presentation, Slide};
use crate::SlideError;
use log::debug;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

fn is_slide_delimiter(line: &str) -> bool {
    line.trim_end() == "---slide"
}

fn is_notes_delimiter(line: &str) -> bool {
    line.trim_end() == "---notes"
}

/// Splits leading YAML front matter from the body. Returns `(None, input)`
/// when the input does not open with a `---` line or the block is unclosed.
pub fn split_front_matter(input: &str) -> (Option<&str>, &str) {
    let Some(rest) = input
        .strip_prefix("---\n")
        .or_else(|| input.strip_prefix("---\r\n"))
    else {
        return (None, input);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, input)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_metadata(yaml: &str) -> Result<Metadata, SlideError> {
    let mut metadata = Metadata::default();
    if yaml.trim().is_empty() {
        return Ok(metadata);
    }

    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| SlideError::ParseError {
        message: format!("Invalid front matter: {}", e),
        suggestion: Some(
            "Front matter must be YAML key/value pairs between two '---' lines".to_string(),
        ),
    })?;

    let field = |key: &str| value.get(key).and_then(scalar_to_string);
    if let Some(title) = field("title") {
        metadata.title = title;
    }
    if let Some(author) = field("author") {
        metadata.author = author;
    }
    if let Some(date) = field("date") {
        metadata.date = date;
    }
    metadata.theme = field("theme");
    Ok(metadata)
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Preamble,
    Slide,
    Notes,
}

fn finish_slide(slides: &mut Vec<Slide>, content: &[&str], notes: Option<&[&str]>) {
    let raw = content.join("\n");
    if raw.trim().is_empty() {
        return;
    }
    let notes = notes
        .map(|lines| lines.join("\n"))
        .filter(|text| !text.trim().is_empty())
        .map(|text| parse_markup(&text));
    slides.push(Slide {
        content: parse_markup(&raw),
        notes,
        raw_content: raw,
    });
}

/// Parses a whole deck: front matter plus slides.
pub fn parse_presentation(input: &str) -> Result<Presentation, SlideError> {
    let (front_matter, body) = split_front_matter(input);
    let metadata = match front_matter {
        Some(yaml) => parse_metadata(yaml)?,
        None => Metadata::default(),
    };

    let mut slides = Vec::new();
    let mut content: Vec<&str> = Vec::new();
    let mut notes: Option<Vec<&str>> = None;
    let mut mode = Mode::Preamble;

    for line in body.lines() {
        if is_slide_delimiter(line) {
            if mode != Mode::Preamble {
                finish_slide(&mut slides, &content, notes.as_deref());
            }
            content.clear();
            notes = None;
            mode = Mode::Slide;
            continue;
        }
        if is_notes_delimiter(line) && mode != Mode::Preamble {
            notes = Some(Vec::new());
            mode = Mode::Notes;
            continue;
        }
        match mode {
            Mode::Preamble => {}
            Mode::Slide => content.push(line),
            Mode::Notes => {
                if let Some(n) = notes.as_mut() {
                    n.push(line);
                }
            }
        }
    }
    if mode != Mode::Preamble {
        finish_slide(&mut slides, &content, notes.as_deref());
    }

    debug!("Parsed {} slide(s) titled {:?}", slides.len(), metadata.title);
    Ok(Presentation { metadata, slides })
}

/// Open element on the tree-building stack.
struct Frame {
    kind: NodeKind,
    children: Vec<MarkupNode>,
}

fn kind_for_tag(tag: &Tag, in_table_head: bool) -> NodeKind {
    match tag {
        Tag::Paragraph => NodeKind::Paragraph,
        Tag::Heading { level, .. } => NodeKind::Heading(*level as u8),
        Tag::List(start) => NodeKind::List {
            ordered: start.is_some(),
            start: start.unwrap_or(1),
        },
        Tag::Item => NodeKind::ListItem,
        Tag::Table(_) => NodeKind::Table,
        Tag::TableHead | Tag::TableRow => NodeKind::TableRow,
        Tag::TableCell => NodeKind::TableCell {
            header: in_table_head,
        },
        Tag::CodeBlock(kind) => NodeKind::CodeBlock {
            language: match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(|lang| lang.to_string()),
                CodeBlockKind::Indented => None,
            },
        },
        Tag::Strong => NodeKind::Bold,
        Tag::Emphasis => NodeKind::Italic,
        Tag::BlockQuote(_) => NodeKind::Unknown("blockquote".to_string()),
        Tag::Strikethrough => NodeKind::Unknown("del".to_string()),
        Tag::Link { .. } => NodeKind::Unknown("a".to_string()),
        Tag::Image { .. } => NodeKind::Unknown("img".to_string()),
        Tag::HtmlBlock => NodeKind::Unknown("html".to_string()),
        _ => NodeKind::Unknown("span".to_string()),
    }
}

/// Code block bodies arrive as several text events; fold them into one.
fn close_frame(frame: Frame) -> MarkupNode {
    match frame.kind {
        NodeKind::CodeBlock { .. } => {
            let code: String = frame.children.iter().map(MarkupNode::text_content).collect();
            MarkupNode::new(frame.kind, vec![MarkupNode::text(code)])
        }
        NodeKind::Unknown(ref tag) if tag == "html" => MarkupNode::new(frame.kind, Vec::new()),
        _ => MarkupNode::new(frame.kind, frame.children),
    }
}

/// Parses a markdown fragment into block-level markup trees.
pub fn parse_markup(markdown: &str) -> Vec<MarkupNode> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut stack = vec![Frame {
        kind: NodeKind::Unknown("root".to_string()),
        children: Vec::new(),
    }];
    let mut in_table_head = false;

    let push_leaf = |stack: &mut Vec<Frame>, node: MarkupNode| {
        if let Some(top) = stack.last_mut() {
            top.children.push(node);
        }
    };

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => {
                if matches!(tag, Tag::TableHead) {
                    in_table_head = true;
                }
                stack.push(Frame {
                    kind: kind_for_tag(&tag, in_table_head),
                    children: Vec::new(),
                });
            }
            Event::End(tag_end) => {
                if matches!(tag_end, TagEnd::TableHead) {
                    in_table_head = false;
                }
                if stack.len() > 1 {
                    if let Some(frame) = stack.pop() {
                        let node = close_frame(frame);
                        push_leaf(&mut stack, node);
                    }
                }
            }
            Event::Text(text) | Event::InlineMath(text) | Event::DisplayMath(text) => {
                push_leaf(&mut stack, MarkupNode::text(text.to_string()));
            }
            Event::Code(code) => push_leaf(&mut stack, MarkupNode::inline_code(code.to_string())),
            Event::SoftBreak => push_leaf(&mut stack, MarkupNode::text(" ")),
            Event::HardBreak => push_leaf(&mut stack, MarkupNode::line_break()),
            Event::Rule => push_leaf(
                &mut stack,
                MarkupNode::new(NodeKind::Unknown("hr".to_string()), Vec::new()),
            ),
            _ => {}
        }
    }

    // Unbalanced input cannot come out of pulldown-cmark, but fold any
    // leftovers anyway so nothing is silently lost.
    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            let node = close_frame(frame);
            push_leaf(&mut stack, node);
        }
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"---
title: "My Presentation"
author: "Sam"
date: 2024-05-01
theme: ./themes/dark.toml
---

this line is ignored

---slide
# Welcome

Some **bold** text.

---notes
Remember to smile.

---slide

---slide
## Features
- [x] Done
- [ ] Todo
"#;

    #[test]
    fn test_split_front_matter() {
        let (yaml, body) = split_front_matter("---\na: 1\n---\nbody\n");
        assert_eq!(yaml, Some("a: 1\n"));
        assert_eq!(body, "body\n");

        let (yaml, body) = split_front_matter("no front matter");
        assert!(yaml.is_none());
        assert_eq!(body, "no front matter");

        let (yaml, _) = split_front_matter("---\nunclosed: true\n");
        assert!(yaml.is_none());
    }

    #[test]
    fn test_parse_presentation_slides_and_notes() {
        let deck = parse_presentation(DECK).unwrap();
        assert_eq!(deck.metadata.title, "My Presentation");
        assert_eq!(deck.metadata.author, "Sam");
        assert_eq!(deck.metadata.date, "2024-05-01");
        assert_eq!(deck.metadata.theme.as_deref(), Some("./themes/dark.toml"));

        // The empty middle slide is dropped.
        assert_eq!(deck.slides.len(), 2);
        assert!(deck.slides[0].has_notes());
        assert!(!deck.slides[1].has_notes());
        assert_eq!(deck.slides[0].title().as_deref(), Some("Welcome"));
        assert!(!deck.slides[0].raw_content.contains("ignored"));
    }

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let deck = parse_presentation("---slide\nhello\n").unwrap();
        assert_eq!(deck.metadata.title, "Untitled Presentation");
        assert_eq!(deck.metadata.author, "Unknown Author");
        assert!(!deck.metadata.date.is_empty());
    }

    #[test]
    fn test_invalid_front_matter_is_parse_error() {
        let result = parse_presentation("---\ntitle: [unclosed\n---\n---slide\nx\n");
        assert!(matches!(result, Err(SlideError::ParseError { .. })));
    }

    #[test]
    fn test_task_items_stay_literal() {
        let blocks = parse_markup("- [x] Done\n- [ ] Todo\n- plain\n");
        assert_eq!(blocks.len(), 1);
        let list = &blocks[0];
        assert_eq!(
            list.kind,
            NodeKind::List {
                ordered: false,
                start: 1
            }
        );
        let texts: Vec<String> = list.children.iter().map(|i| i.text_content()).collect();
        assert_eq!(texts, vec!["[x] Done", "[ ] Todo", "plain"]);
    }

    #[test]
    fn test_code_block_language_and_text() {
        let blocks = parse_markup("```rust ignore\nfn main() {}\nlet x = 1;\n```\n");
        assert_eq!(
            blocks[0].kind,
            NodeKind::CodeBlock {
                language: Some("rust".to_string())
            }
        );
        assert_eq!(blocks[0].children.len(), 1);
        assert_eq!(blocks[0].text_content(), "fn main() {}\nlet x = 1;\n");
    }

    #[test]
    fn test_table_head_cells_are_headers() {
        let blocks = parse_markup("| a | b |\n|---|---|\n| 1 | 2 |\n");
        let table = &blocks[0];
        assert_eq!(table.kind, NodeKind::Table);
        assert_eq!(table.children.len(), 2);
        assert_eq!(
            table.children[0].children[0].kind,
            NodeKind::TableCell { header: true }
        );
        assert_eq!(
            table.children[1].children[1].kind,
            NodeKind::TableCell { header: false }
        );
        assert_eq!(table.children[1].children[1].text_content(), "2");
    }

    #[test]
    fn test_inline_markup_mapping() {
        let blocks = parse_markup("a **b** *c* `d`  \ne");
        let para = &blocks[0];
        assert_eq!(para.kind, NodeKind::Paragraph);
        let kinds: Vec<&NodeKind> = para.children.iter().map(|c| &c.kind).collect();
        assert!(kinds.contains(&&NodeKind::Bold));
        assert!(kinds.contains(&&NodeKind::Italic));
        assert!(kinds.contains(&&NodeKind::InlineCode));
        assert!(kinds.contains(&&NodeKind::LineBreak));
    }

    #[test]
    fn test_unknown_elements_keep_children() {
        let blocks = parse_markup("> quoted *text*\n");
        assert_eq!(blocks[0].kind, NodeKind::Unknown("blockquote".to_string()));
        assert_eq!(blocks[0].text_content(), "quoted text");
    }
}
