//! The slidepress library turns a markdown slide deck into a paginated PDF presentation.
//! It parses the deck into slides, lays every slide out on fixed-size pages with a themed
//! header and footer, and writes the result with the PDF base-14 fonts.
//!
//! Slides are separated by a `---slide` line. A `---notes` line inside a slide starts its
//! speaker notes, which can be written to a second document. Optional YAML front matter
//! names the title, author, date and theme file of the deck.
//!
//! Basic usage passes the deck as a string along with an output path:
//! ```rust
//! use slidepress::config::ConfigSource;
//! use std::error::Error;
//!
//! fn example() -> Result<(), Box<dyn Error>> {
//!     let deck = "---slide\n# Hello\n\nFirst slide.\n---slide\n# Bye\n";
//!     slidepress::parse_into_file(deck, "deck.pdf", ConfigSource::Default)?;
//!     Ok(())
//! }
//! ```
//!
//! Themes are TOML files. Every key is optional and missing ones keep their defaults:
//! ```toml
//! [layout]
//! margin = 72
//! slide_width = 792
//! slide_height = 612
//! orientation = "landscape"
//!
//! [colors]
//! primary = "#1a4d80"
//! background = "#ffffff"
//!
//! [fonts]
//! body = "Helvetica"
//! code = "Courier"
//!
//! [diagram]
//! tool = "mmdc"
//! remote = true
//! timeout_secs = 30
//! ```
//!
//! Code blocks are highlighted with syntect. Mermaid blocks go through a chain of renderers:
//! the local command-line tool as SVG, then as PNG, then an online rendering service, and
//! finally the diagram source in a code box. A failing block never stops the document; it is
//! replaced by a short note and layout carries on.
//!
//! ## Conversion Flow
//! ```text
//! +-------------+     +----------------+     +------------------+
//! |  Deck       |     |  Slides        |     |  Pages           |
//! |  ---slide   | --> |  MarkupNode    | --> |  chrome + blocks |
//! |  # Title    |     |  trees + notes |     |  DrawOp lists    |
//! +-------------+     +----------------+     +------------------+
//!                                                     |
//! +---------------+     +------------------+          v
//! | Theme (TOML)  | --> | Diagram chain    |     +--------------+
//! | - layout      |     | - mmdc svg/png   | --> | lopdf writer |
//! | - colors      |     | - remote service |     | PDF document |
//! +---------------+     +------------------+     +--------------+
//! ```

pub mod blocks;
pub mod canvas;
pub mod code;
pub mod config;
pub mod diagram;
pub mod highlighting;
pub mod images;
pub mod inline;
pub mod markdown;
pub mod markup;
pub mod metrics;
pub mod pdf;
pub mod render;
pub mod styling;
pub mod table;
pub mod validation;

use config::ConfigSource;
use diagram::DiagramChain;
use markup::Presentation;
use render::{render_notes, render_presentation};
use std::error::Error;
use std::fmt;
use std::path::Path;
use styling::Theme;

/// Errors that can end a conversion.
#[derive(Debug)]
pub enum SlideError {
    /// The deck or its front matter could not be parsed
    ParseError {
        message: String,
        suggestion: Option<String>,
    },
    /// A theme file was requested but could not be used
    ConfigError { message: String, suggestion: String },
    /// Layout could not start, for example without a diagram workspace
    RenderError { message: String },
    /// The PDF could not be assembled or written
    PdfError {
        message: String,
        path: Option<String>,
        suggestion: Option<String>,
    },
    /// Reading the deck or preparing the output location failed
    IoError {
        message: String,
        path: String,
        suggestion: String,
    },
    /// The deck contains no slides
    EmptyPresentation,
}

impl Error for SlideError {}
impl fmt::Display for SlideError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlideError::ParseError { message, suggestion } => {
                write!(f, "❌ Deck Parsing Error: {}", message)?;
                if let Some(hint) = suggestion {
                    write!(f, "\n💡 Suggestion: {}", hint)?;
                }
                Ok(())
            }
            SlideError::ConfigError { message, suggestion } => {
                write!(f, "❌ Configuration Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            SlideError::RenderError { message } => write!(f, "❌ Rendering Error: {}", message),
            SlideError::PdfError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ PDF Generation Error: {}", message)?;
                if let Some(p) = path {
                    write!(f, "\n📁 Path: {}", p)?;
                }
                if let Some(hint) = suggestion {
                    write!(f, "\n💡 Suggestion: {}", hint)?;
                }
                Ok(())
            }
            SlideError::IoError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ File Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)?;
                Ok(())
            }
            SlideError::EmptyPresentation => {
                write!(f, "❌ Presentation Error: the deck has no slides")?;
                write!(f, "\n💡 Suggestion: Start each slide with a line containing only '---slide'")?;
                Ok(())
            }
        }
    }
}

impl SlideError {
    /// Creates a simple parse error with just a message
    pub fn parse_error(message: impl Into<String>) -> Self {
        SlideError::ParseError {
            message: message.into(),
            suggestion: Some("Check the front matter and the '---slide' separators".to_string()),
        }
    }

    /// Creates a simple PDF error with just a message
    pub fn pdf_error(message: impl Into<String>) -> Self {
        SlideError::PdfError {
            message: message.into(),
            path: None,
            suggestion: Some(
                "Check that the output directory exists and you have write permissions".to_string(),
            ),
        }
    }
}

/// Failure inside the layout of one block. These never end a conversion: the
/// block renderer turns them into an inline note.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A bounding box with no usable area was requested
    InvalidBounds { width: f32, height: f32 },
    /// Blocks nest deeper than the renderer follows
    NestingTooDeep(usize),
    /// A table could not be fitted to the content width
    TableOverflow(String),
    /// An image could not be measured or placed
    Image(String),
}

impl Error for LayoutError {}
impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LayoutError::InvalidBounds { width, height } => {
                write!(f, "invalid bounding box {:.1}x{:.1}", width, height)
            }
            LayoutError::NestingTooDeep(depth) => write!(f, "content nested {} levels deep", depth),
            LayoutError::TableOverflow(msg) => write!(f, "table does not fit: {}", msg),
            LayoutError::Image(msg) => write!(f, "image could not be placed: {}", msg),
        }
    }
}

/// Loads a theme file the user asked for explicitly. Unlike
/// [`config::load_config_from_source`] a missing file is an error here.
pub fn load_theme_file(path: &Path) -> Result<Theme, SlideError> {
    let content = std::fs::read_to_string(path).map_err(|e| SlideError::ConfigError {
        message: format!("Cannot read theme file {}: {}", path.display(), e),
        suggestion: "Check the path, or print a starting point with --get-default-configuration"
            .to_string(),
    })?;
    Ok(config::parse_config_string(&content))
}

/// Picks the theme for a deck. An explicit source wins; with
/// [`ConfigSource::Default`] the `theme:` named in the front matter is used,
/// resolved against `base_dir` when it is relative.
pub fn resolve_theme(presentation: &Presentation, config: ConfigSource, base_dir: Option<&Path>) -> Theme {
    if let ConfigSource::Default = config {
        if let Some(theme_path) = &presentation.metadata.theme {
            let path = match base_dir {
                Some(dir) if Path::new(theme_path).is_relative() => dir.join(theme_path),
                _ => Path::new(theme_path).to_path_buf(),
            };
            let path = path.to_string_lossy();
            return config::load_config_from_source(ConfigSource::File(&path));
        }
    }
    config::load_config_from_source(config)
}

fn diagram_chain(theme: &Theme) -> Result<DiagramChain, SlideError> {
    DiagramChain::new(&theme.diagram).map_err(|e| SlideError::RenderError {
        message: format!("Cannot create diagram workspace: {}", e),
    })
}

fn check_output_dir(path: &Path) -> Result<(), SlideError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(SlideError::IoError {
                message: "Output directory does not exist".to_string(),
                path: parent.display().to_string(),
                suggestion: format!("Create the directory first: mkdir -p {}", parent.display()),
            });
        }
    }
    Ok(())
}

/// Renders the slides of `presentation` and writes them to `path`.
///
/// The diagram workspace lives until the file is written, so diagram images
/// are still on disk when the writer embeds them.
/// Returns the number of pages written.
pub fn write_presentation(presentation: &Presentation, theme: &Theme, path: &Path) -> Result<usize, SlideError> {
    check_output_dir(path)?;
    let diagrams = diagram_chain(theme)?;
    let document = render_presentation(presentation, theme, &diagrams)?;
    let pages = document.page_count();
    document.into_pdf().render(path)?;
    Ok(pages)
}

/// Renders the speaker notes of `presentation` to `path`. Returns `false`
/// without touching the file system when no slide has notes.
pub fn write_notes(presentation: &Presentation, theme: &Theme, path: &Path) -> Result<bool, SlideError> {
    if !presentation.has_notes() {
        return Ok(false);
    }
    check_output_dir(path)?;
    let diagrams = diagram_chain(theme)?;
    match render_notes(presentation, theme, &diagrams) {
        Some(document) => {
            document.into_pdf().render(path)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Converts a markdown deck into a PDF file at `path`.
///
/// # Arguments
/// * `markdown` - The deck, optionally starting with YAML front matter
/// * `path` - The output file path for the generated PDF
/// * `config` - Theme source (Default, File path, or Embedded TOML)
///
/// # Example
/// ```rust
/// use slidepress::config::ConfigSource;
/// use std::error::Error;
///
/// fn example() -> Result<(), Box<dyn Error>> {
///     let deck = "---slide\n# Hello\n";
///     slidepress::parse_into_file(deck, "out1.pdf", ConfigSource::Default)?;
///     slidepress::parse_into_file(deck, "out2.pdf", ConfigSource::File("theme.toml"))?;
///     slidepress::parse_into_file(deck, "out3.pdf", ConfigSource::Embedded("[layout]\nmargin = 36"))?;
///     Ok(())
/// }
/// ```
pub fn parse_into_file(markdown: &str, path: impl AsRef<Path>, config: ConfigSource) -> Result<(), SlideError> {
    let presentation = markdown::parse_presentation(markdown)?;
    let theme = resolve_theme(&presentation, config, None);
    write_presentation(&presentation, &theme, path.as_ref())?;
    Ok(())
}

/// Converts a markdown deck and returns the PDF as bytes.
///
/// ```rust
/// use slidepress::config::ConfigSource;
///
/// let bytes = slidepress::parse_into_bytes("---slide\n# Hello\n", ConfigSource::Default).unwrap();
/// assert!(bytes.starts_with(b"%PDF-"));
/// ```
pub fn parse_into_bytes(markdown: &str, config: ConfigSource) -> Result<Vec<u8>, SlideError> {
    let presentation = markdown::parse_presentation(markdown)?;
    let theme = resolve_theme(&presentation, config, None);
    let diagrams = diagram_chain(&theme)?;
    let document = render_presentation(&presentation, &theme, &diagrams)?;
    document.into_pdf().render_to_bytes()
}

/// Converts the speaker notes of a deck into PDF bytes, or `None` when the
/// deck has no notes.
pub fn notes_into_bytes(markdown: &str, config: ConfigSource) -> Result<Option<Vec<u8>>, SlideError> {
    let presentation = markdown::parse_presentation(markdown)?;
    let theme = resolve_theme(&presentation, config, None);
    let diagrams = diagram_chain(&theme)?;
    render_notes(&presentation, &theme, &diagrams)
        .map(|document| document.into_pdf().render_to_bytes())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DECK: &str = "---\ntitle: Test Deck\nauthor: Tester\n---\n---slide\n# One\n\nHello **world**.\n---notes\nRemember this.\n---slide\n# Two\n\n- a\n- b\n";

    #[test]
    fn test_basic_deck_to_bytes() {
        let bytes = parse_into_bytes(DECK, ConfigSource::Default).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_empty_deck_is_an_error() {
        let result = parse_into_bytes("# no slide separator", ConfigSource::Default);
        assert!(matches!(result, Err(SlideError::EmptyPresentation)));
    }

    #[test]
    fn test_bad_front_matter_is_a_parse_error() {
        let result = parse_into_bytes("---\ntitle: [unclosed\n---\n---slide\nx\n", ConfigSource::Default);
        assert!(matches!(result, Err(SlideError::ParseError { .. })));
    }

    #[test]
    fn test_parse_into_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("deck.pdf");
        parse_into_file(DECK, &out, ConfigSource::Default).unwrap();
        let bytes = fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_missing_output_directory() {
        let result = parse_into_file(DECK, "/nonexistent/directory/deck.pdf", ConfigSource::Default);
        assert!(matches!(result, Err(SlideError::IoError { .. })));
    }

    #[test]
    fn test_embedded_config_changes_page_size() {
        const LANDSCAPE: &str = "[layout]\norientation = \"landscape\"\n";
        let bytes = parse_into_bytes(DECK, ConfigSource::Embedded(LANDSCAPE)).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = media_box[2].as_float().unwrap();
        let height = media_box[3].as_float().unwrap();
        assert!(width > height);
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let bytes = parse_into_bytes(DECK, ConfigSource::Embedded("not toml {{{")).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_front_matter_theme_is_resolved_against_base_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("narrow.toml"), "[layout]\nmargin = 20\n").unwrap();
        let deck = markdown::parse_presentation("---\ntheme: narrow.toml\n---\n---slide\nx\n").unwrap();

        let theme = resolve_theme(&deck, ConfigSource::Default, Some(dir.path()));
        assert_eq!(theme.layout.margin, 20.0);

        let explicit = resolve_theme(&deck, ConfigSource::Embedded("[layout]\nmargin = 40\n"), Some(dir.path()));
        assert_eq!(explicit.layout.margin, 40.0);
    }

    #[test]
    fn test_load_theme_file_requires_the_file() {
        let result = load_theme_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(SlideError::ConfigError { .. })));
    }

    #[test]
    fn test_notes_into_bytes() {
        let notes = notes_into_bytes(DECK, ConfigSource::Default).unwrap().unwrap();
        let doc = lopdf::Document::load_mem(&notes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let none = notes_into_bytes("---slide\n# Only\n", ConfigSource::Default).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_write_notes_skips_decks_without_notes() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("notes.pdf");
        let deck = markdown::parse_presentation("---slide\n# Only\n").unwrap();
        assert!(!write_notes(&deck, &Theme::default(), &out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_error_display_variants_and_constructors() {
        let s = SlideError::parse_error("bad deck").to_string();
        assert!(s.contains("Deck Parsing Error: bad deck"));
        assert!(s.contains("💡 Suggestion:"));

        let s = SlideError::pdf_error("render failed").to_string();
        assert!(s.contains("PDF Generation Error: render failed"));

        let s = SlideError::IoError {
            message: "io fail".to_string(),
            path: "/path/to".to_string(),
            suggestion: "check path".to_string(),
        }
        .to_string();
        assert!(s.contains("File Error: io fail"));
        assert!(s.contains("📁 Path: /path/to"));

        let s = SlideError::ConfigError {
            message: "bad cfg".to_string(),
            suggestion: "fix cfg".to_string(),
        }
        .to_string();
        assert!(s.contains("Configuration Error: bad cfg"));
        assert!(s.contains("fix cfg"));

        assert!(SlideError::EmptyPresentation.to_string().contains("---slide"));
        assert_eq!(LayoutError::NestingTooDeep(65).to_string(), "content nested 65 levels deep");
    }
}
