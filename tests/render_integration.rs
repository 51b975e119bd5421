use lopdf::content::Content;
use lopdf::{Document, Object};
use slidepress::config::ConfigSource;
use slidepress::diagram::DiagramChain;
use slidepress::markdown::parse_presentation;
use slidepress::render::render_presentation;
use slidepress::styling::Theme;
use std::collections::BTreeSet;
use tempfile::tempdir;

const DECK: &str = r#"---
title: Integration Deck
author: Test Author
date: 2024-01-02
---
---slide
# Overview

Plain **bold** and *italic* text.

- [x] done
- [ ] todo

---slide
# Code

```rust
fn main() {
    println!("hi");
}
```

---slide
# Quarterly

| Region | Sales |
|--------|-------|
| North  | 10    |
| South  | 12    |

---notes
Talk about the table.
"#;

/// Every string shown with `Tj` on page `number`, one per line.
fn page_text(doc: &Document, number: u32) -> String {
    let page_id = doc.get_pages()[&number];
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `(BaseFont, text)` for every `Tj` on page `number`, following `Tf` changes.
fn page_runs(doc: &Document, number: u32) -> Vec<(String, String)> {
    let page_id = doc.get_pages()[&number];
    let fonts = doc.get_page_fonts(page_id).unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    let mut current = String::new();
    let mut runs = Vec::new();
    for op in &content.operations {
        match (op.operator.as_str(), op.operands.first()) {
            ("Tf", Some(Object::Name(name))) => {
                current = fonts
                    .get(name)
                    .and_then(|font| font.get(b"BaseFont").ok())
                    .and_then(|base| base.as_name().ok())
                    .map(|base| String::from_utf8_lossy(base).into_owned())
                    .unwrap_or_default();
            }
            ("Tj", Some(Object::String(bytes, _))) => {
                runs.push((current.clone(), String::from_utf8_lossy(bytes).into_owned()));
            }
            _ => {}
        }
    }
    runs
}

fn base_fonts(doc: &Document) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for (_, page_id) in doc.get_pages() {
        for (_, font) in doc.get_page_fonts(page_id).unwrap() {
            if let Ok(Object::Name(name)) = font.get(b"BaseFont") {
                names.insert(String::from_utf8_lossy(name).into_owned());
            }
        }
    }
    names
}

#[test]
fn test_deck_becomes_one_page_per_slide() {
    let bytes = slidepress::parse_into_bytes(DECK, ConfigSource::Default).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    let fonts = base_fonts(&doc);
    for expected in ["Helvetica", "Helvetica-Bold", "Helvetica-Oblique", "Courier", "ZapfDingbats"] {
        assert!(fonts.contains(expected), "missing {} in {:?}", expected, fonts);
    }
}

#[test]
fn test_slide_text_and_chrome_are_extractable() {
    let bytes = slidepress::parse_into_bytes(DECK, ConfigSource::Default).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();

    let code_page = page_text(&doc, 2);
    assert!(code_page.contains("Integration Deck"));
    assert!(code_page.contains("2 / 3"));
    assert!(code_page.contains("Author"));
    assert!(code_page.contains("println"));

    let table_page = page_text(&doc, 3);
    assert!(table_page.contains("Quarterly"));
    assert!(table_page.contains("North"));
    assert!(!table_page.contains("Talk about"));
}

#[test]
fn test_info_dictionary_carries_title() {
    let bytes = slidepress::parse_into_bytes(DECK, ConfigSource::Default).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let info = match doc.trailer.get(b"Info").unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        other => panic!("unexpected Info entry {:?}", other),
    };
    match info.get(b"Title").unwrap() {
        Object::String(bytes, _) => assert_eq!(bytes.as_slice(), b"Integration Deck"),
        other => panic!("unexpected title {:?}", other),
    }
}

#[test]
fn test_notes_document_lists_only_noted_slides() {
    let bytes = slidepress::notes_into_bytes(DECK, ConfigSource::Default).unwrap().unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    let text = page_text(&doc, 1);
    assert!(text.contains("Speaker Notes"));
    assert!(text.contains("Slide 3: Quarterly"));
    assert!(text.contains("Talk about the table."));
}

#[test]
fn test_long_slide_continues_with_chrome() {
    let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(30);
    let deck = format!("---slide\n# Long\n\n{0}\n\n{0}\n\n{0}\n\n{0}\n", paragraph);
    let bytes = slidepress::parse_into_bytes(&deck, ConfigSource::Default).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let pages = doc.get_pages();
    assert!(pages.len() > 1);
    for number in pages.keys() {
        assert!(page_text(&doc, *number).contains("1 / 1"));
    }
}

#[test]
fn test_mermaid_without_renderers_shows_source_box() {
    let deck = parse_presentation("---slide\n# Flow\n\n```mermaid\ngraph TD\n  A-->B\n```\n").unwrap();
    let theme = Theme::default();
    let diagrams = DiagramChain::with_tiers(Vec::new()).unwrap();
    let rendered = render_presentation(&deck, &theme, &diagrams).unwrap();
    let bytes = rendered.into_pdf().render_to_bytes().unwrap();

    let doc = Document::load_mem(&bytes).unwrap();
    let text = page_text(&doc, 1);
    assert!(text.contains("Mermaid Diagram:"));
    assert!(text.contains("A-->B"));
    assert!(text.contains("Mermaid CLI not available"));

    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    assert!(!content.operations.iter().any(|op| op.operator == "Do"));
}

#[test]
fn test_file_output_matches_byte_output() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("deck.pdf");
    slidepress::parse_into_file(DECK, &out, ConfigSource::Default).unwrap();
    let doc = Document::load(&out).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn test_theme_colors_reach_the_page() {
    const DARK: &str = "[colors]\nbackground = \"#102030\"\n";
    let bytes = slidepress::parse_into_bytes("---slide\n# Dark\n", ConfigSource::Embedded(DARK)).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();

    let fill = content
        .operations
        .iter()
        .find(|op| op.operator == "rg")
        .expect("background fill");
    let components: Vec<f32> = fill.operands.iter().map(|o| o.as_float().unwrap()).collect();
    assert!((components[0] - 0x10 as f32 / 255.0).abs() < 0.01);
    assert!((components[2] - 0x30 as f32 / 255.0).abs() < 0.01);
}

#[test]
fn test_task_items_and_soft_breaks_survive_markdown() {
    let deck = "---slide\n# Tasks\n\nline one\nline two\n\n- [ ] todo\n- [x] done\n";
    let bytes = slidepress::parse_into_bytes(deck, ConfigSource::Default).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let runs = page_runs(&doc, 1);

    assert!(runs.iter().any(|(_, text)| text == "line one line two"));
    assert!(!runs.iter().any(|(_, text)| text.contains("[]")));

    let glyphs: Vec<&str> = runs
        .iter()
        .filter(|(font, _)| font == "ZapfDingbats")
        .map(|(_, text)| text.as_str())
        .collect();
    assert_eq!(glyphs, vec!["o", "4"]);

    let after = |glyph: &str| {
        let at = runs.iter().position(|(font, text)| font == "ZapfDingbats" && text == glyph).unwrap();
        runs[at + 1].1.trim().to_string()
    };
    assert_eq!(after("o"), "todo");
    assert_eq!(after("4"), "done");
}
