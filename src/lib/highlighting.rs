//! Syntax highlighting for code blocks using syntect's bundled grammars and
//! the InspiredGitHub theme.

use crate::styling::Color;
use lazy_static::lazy_static;
use std::fmt;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// A piece of highlighted code with its color and weight.
///
/// A token whose text is `"\n"` marks the end of a source line; no other
/// token contains a newline.
///
/// ```
/// use slidepress::highlighting::HighlightedToken;
/// use slidepress::styling::Color;
///
/// let token = HighlightedToken {
///     text: "fn".to_string(),
///     color: Color::rgb(167, 29, 93),
///     bold: true,
///     italic: false,
/// };
/// assert!(!token.is_newline());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightedToken {
    pub text: String,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
}

impl HighlightedToken {
    pub fn is_newline(&self) -> bool {
        self.text == "\n"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HighlightError {
    /// No grammar matches the language tag.
    UnknownLanguage(String),
    /// syntect failed while highlighting a line.
    Syntect(String),
}

impl fmt::Display for HighlightError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HighlightError::UnknownLanguage(lang) => write!(f, "no grammar for language '{}'", lang),
            HighlightError::Syntect(msg) => write!(f, "highlighter failed: {}", msg),
        }
    }
}

impl std::error::Error for HighlightError {}

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME_SET: ThemeSet = ThemeSet::load_defaults();
}

/// Maps common fence tags onto tokens syntect's default grammars know.
/// Languages without a bundled grammar borrow the closest one.
fn canonical_token(language: &str) -> &str {
    match language {
        "c++" | "cxx" | "hpp" => "cpp",
        "c#" | "csharp" => "cs",
        "ts" | "typescript" | "jsx" | "tsx" => "js",
        "shell" | "zsh" | "console" => "sh",
        "yml" => "yaml",
        "py3" | "python3" => "py",
        "golang" => "go",
        "rs" => "rust",
        "md" => "markdown",
        other => other,
    }
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let lower = language.trim().to_lowercase();
    if lower.is_empty() || lower == "text" || lower == "plain" {
        return None;
    }
    SYNTAX_SET.find_syntax_by_token(canonical_token(&lower))
}

fn theme() -> Option<&'static Theme> {
    THEME_SET
        .themes
        .get("InspiredGitHub")
        .or_else(|| THEME_SET.themes.get("base16-ocean.light"))
        .or_else(|| THEME_SET.themes.values().next())
}

/// Whether a grammar exists for `language`.
pub fn is_language_supported(language: &str) -> bool {
    find_syntax(language).is_some()
}

/// Highlights `code` as `language`.
///
/// Returns one token per styled range, with a `"\n"` token between source
/// lines. Unknown languages are an error so the caller can fall back to plain
/// text.
///
/// ```
/// use slidepress::highlighting::highlight_code;
///
/// let tokens = highlight_code("fn main() {}\nlet x = 1;", "rust").unwrap();
/// assert!(tokens.iter().any(|t| t.text.contains("fn")));
/// assert_eq!(tokens.iter().filter(|t| t.is_newline()).count(), 1);
///
/// assert!(highlight_code("x", "no-such-language").is_err());
/// ```
pub fn highlight_code(code: &str, language: &str) -> Result<Vec<HighlightedToken>, HighlightError> {
    let syntax = find_syntax(language)
        .ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;
    let theme = theme().ok_or_else(|| HighlightError::Syntect("no themes available".to_string()))?;

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut tokens = Vec::new();

    for line in LinesWithEndings::from(code) {
        let ranges = highlighter
            .highlight_line(line, &SYNTAX_SET)
            .map_err(|e| HighlightError::Syntect(e.to_string()))?;

        for (style, text) in ranges {
            let text = text.trim_end_matches(['\n', '\r']);
            if text.is_empty() {
                continue;
            }
            let fg = style.foreground;
            let mut color = Color::rgb(fg.r, fg.g, fg.b);
            // White text would vanish on the light box fill.
            if color == Color::WHITE {
                color = Color::rgb(220, 220, 220);
            }
            tokens.push(HighlightedToken {
                text: text.to_string(),
                color,
                bold: style.font_style.contains(FontStyle::BOLD),
                italic: style.font_style.contains(FontStyle::ITALIC),
            });
        }

        tokens.push(HighlightedToken {
            text: "\n".to_string(),
            color: Color::rgb(200, 200, 200),
            bold: false,
            italic: false,
        });
    }

    if tokens.last().is_some_and(HighlightedToken::is_newline) {
        tokens.pop();
    }
    Ok(tokens)
}

/// Splits a token stream into source lines.
pub fn split_lines(tokens: &[HighlightedToken]) -> Vec<Vec<HighlightedToken>> {
    let mut lines = vec![Vec::new()];
    for token in tokens {
        if token.is_newline() {
            lines.push(Vec::new());
        } else if let Some(line) = lines.last_mut() {
            line.push(token.clone());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_CODE: &str = r#"def greet(name):
    return f"Hello from {name}"

print(greet("Python"))"#;

    const RUST_CODE: &str = r#"fn main() {
    let x = 42;
    println!("{}", x);
}"#;

    fn text_of(tokens: &[HighlightedToken]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_highlight_preserves_text() {
        let tokens = highlight_code(RUST_CODE, "rust").unwrap();
        assert_eq!(text_of(&tokens), RUST_CODE);
    }

    #[test]
    fn test_highlight_python() {
        let tokens = highlight_code(PYTHON_CODE, "python").unwrap();
        assert!(tokens.iter().any(|t| t.text.contains("def")));
        assert_eq!(split_lines(&tokens).len(), 4);
    }

    #[test]
    fn test_highlight_colors_differ_by_token_type() {
        let tokens = highlight_code("fn test() { return 42; }", "rust").unwrap();
        let mut colors: Vec<Color> = tokens.iter().map(|t| t.color).collect();
        colors.dedup();
        assert!(colors.len() > 1);
    }

    #[test]
    fn test_language_aliases() {
        assert!(is_language_supported("rs"));
        assert!(is_language_supported("Python"));
        assert!(is_language_supported("bash"));
        assert!(is_language_supported("ts"));
        assert!(is_language_supported("yml"));
        assert!(!is_language_supported("mermaid"));
        assert!(!is_language_supported(""));
    }

    #[test]
    fn test_unknown_language_is_error() {
        assert_eq!(
            highlight_code("x", "klingon"),
            Err(HighlightError::UnknownLanguage("klingon".to_string()))
        );
    }

    #[test]
    fn test_split_lines_keeps_empty_lines() {
        let tokens = highlight_code("a = 1\n\nb = 2\n", "python").unwrap();
        let lines = split_lines(&tokens);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_empty());
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let tokens = highlight_code("    indented", "python").unwrap();
        assert!(text_of(&tokens).starts_with("    "));
    }
}
