//! Pre-flight checks run before a deck is rendered.
//!
//! None of these stop a conversion. They point out content that will come
//! out degraded so the user can fix it first.

use crate::diagram::{CommandRunner, ToolRunner};
use crate::highlighting;
use crate::markup::{MarkupNode, NodeKind, Presentation};
use crate::styling::Theme;
use std::collections::BTreeSet;

/// Smallest usable slide content height in points.
const MIN_CONTENT_HEIGHT: f32 = 100.0;
/// Header and footer space taken from each slide page.
const CHROME_HEIGHT: f32 = 170.0;

fn code_blocks(nodes: &[MarkupNode]) -> Vec<Option<String>> {
    let mut found = Vec::new();
    for node in nodes {
        node.walk(&mut |n| {
            if let NodeKind::CodeBlock { language } = &n.kind {
                found.push(language.clone());
            }
        });
    }
    found
}

fn is_diagram(language: &Option<String>) -> bool {
    language
        .as_deref()
        .is_some_and(|l| l.trim().eq_ignore_ascii_case("mermaid"))
}

fn is_plain(language: &str) -> bool {
    matches!(language.trim().to_lowercase().as_str(), "" | "text" | "plain" | "txt")
}

fn remote_available(theme: &Theme) -> bool {
    theme.diagram.remote && cfg!(feature = "fetch")
}

/// Checks `presentation` against `theme`, probing for the diagram tool on
/// the `PATH`.
pub fn validate_presentation(presentation: &Presentation, theme: &Theme) -> Vec<String> {
    let runner = CommandRunner::new(theme.diagram.tool.clone(), theme.diagram.timeout);
    validate_with_runner(presentation, theme, &runner)
}

/// Same as [`validate_presentation`] with an explicit tool runner. The tool
/// is only probed when the deck contains diagrams.
pub fn validate_with_runner(presentation: &Presentation, theme: &Theme, runner: &dyn ToolRunner) -> Vec<String> {
    let mut warnings = Vec::new();

    if presentation.slides.is_empty() {
        warnings.push(
            "Presentation has no slides. Start each slide with a '---slide' line.".to_string(),
        );
    }

    let (_, height) = theme.layout.page_size();
    let content_height = height - 2.0 * theme.layout.margin - CHROME_HEIGHT;
    if content_height < MIN_CONTENT_HEIGHT {
        warnings.push(format!(
            "Slide content area is only {:.0}pt tall. Reduce the margin ({:.0}pt) or use a taller page.",
            content_height.max(0.0),
            theme.layout.margin
        ));
    }

    let mut diagrams = 0;
    let mut unknown_languages = BTreeSet::new();
    for slide in &presentation.slides {
        let mut blocks = code_blocks(&slide.content);
        if let Some(notes) = &slide.notes {
            blocks.extend(code_blocks(notes));
        }
        for language in blocks {
            if is_diagram(&language) {
                diagrams += 1;
            } else if let Some(lang) = language.filter(|l| !is_plain(l)) {
                if !highlighting::is_language_supported(&lang) {
                    unknown_languages.insert(lang);
                }
            }
        }
    }

    if diagrams > 0 && !remote_available(theme) && !runner.available() {
        warnings.push(format!(
            "{} mermaid diagram(s) will be shown as source: '{}' was not found and remote rendering is off. \
             Install it with: npm install -g @mermaid-js/mermaid-cli",
            diagrams, theme.diagram.tool
        ));
    }

    for lang in unknown_languages {
        warnings.push(format!(
            "No syntax highlighting for '{}'; those code blocks render as plain text.",
            lang
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramError;
    use crate::markdown::parse_presentation;
    use std::cell::Cell;

    struct Probe {
        available: bool,
        probed: Cell<bool>,
    }

    impl Probe {
        fn new(available: bool) -> Self {
            Self {
                available,
                probed: Cell::new(false),
            }
        }
    }

    impl ToolRunner for Probe {
        fn available(&self) -> bool {
            self.probed.set(true);
            self.available
        }

        fn run(&self, _args: &[String]) -> Result<(), DiagramError> {
            Ok(())
        }
    }

    fn offline_theme() -> Theme {
        let mut theme = Theme::default();
        theme.diagram.remote = false;
        theme
    }

    #[test]
    fn test_clean_deck_has_no_warnings() {
        let deck = parse_presentation("---slide\n# Hi\n\n```rust\nfn main() {}\n```\n\n```text\nplain\n```\n").unwrap();
        let probe = Probe::new(false);
        assert!(validate_with_runner(&deck, &offline_theme(), &probe).is_empty());
        assert!(!probe.probed.get());
    }

    #[test]
    fn test_empty_deck_warns() {
        let warnings = validate_with_runner(&Presentation::default(), &Theme::default(), &Probe::new(true));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no slides"));
    }

    #[test]
    fn test_diagram_without_any_renderer_warns() {
        let deck = parse_presentation("---slide\n```mermaid\ngraph TD\n```\n").unwrap();
        let warnings = validate_with_runner(&deck, &offline_theme(), &Probe::new(false));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("1 mermaid diagram(s)"));

        assert!(validate_with_runner(&deck, &offline_theme(), &Probe::new(true)).is_empty());
    }

    #[test]
    fn test_unknown_language_warns_once() {
        let deck = parse_presentation(
            "---slide\n```klingon\nx\n```\n---slide\n```klingon\ny\n```\n",
        )
        .unwrap();
        let warnings = validate_with_runner(&deck, &offline_theme(), &Probe::new(true));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'klingon'"));
    }

    #[test]
    fn test_tiny_content_area_warns() {
        let mut theme = offline_theme();
        theme.layout.margin = 250.0;
        let deck = parse_presentation("---slide\nhello\n").unwrap();
        let warnings = validate_with_runner(&deck, &theme, &Probe::new(true));
        assert!(warnings.iter().any(|w| w.contains("content area")));
    }
}
