//! Theme configuration loading.
//!
//! Themes are TOML files. Every key is optional; anything missing or malformed
//! keeps its built-in default so a broken theme never stops a deck from
//! rendering.
//!
//! # Configuration Structure
//!
//! - `[layout]` page geometry: `margin`, `slide_width`, `slide_height`, `orientation`
//! - `[colors]` hex colors: `primary`, `secondary`, `background`, `text`
//! - `[fonts]` base-14 family names: `body`, `heading`, `code`
//! - `[text]` point sizes: `paragraph_size`, `list_size`, `table_size`, `code_size`, `body_size`
//! - `[diagram]` mermaid settings: `tool`, `width`, `height`, `theme`, `background`,
//!   `remote`, `endpoint`, `timeout_secs`
//!
//! # Configuration Example
//!
//! ```toml
//! [layout]
//! margin = 48
//! slide_width = 612
//! slide_height = 792
//! orientation = "landscape"
//!
//! [colors]
//! primary = "#2563eb"
//! text = "#1e293b"
//!
//! [fonts]
//! body = "Helvetica"
//! code = "Courier"
//!
//! [diagram]
//! tool = "mmdc"
//! remote = false
//! timeout_secs = 20
//! ```
//!
//! Orientation is applied as an explicit swap: portrait always yields the
//! taller page, landscape the wider one, whatever order width and height were
//! written in.

use crate::styling::{Color, FontFamily, Orientation, Theme};
use log::warn;
use std::fs;
use std::path::Path;
use std::time::Duration;
use toml::Value;

/// Configuration source for the theme.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Use the built-in theme
    Default,
    /// Load a theme from a file path
    File(&'a str),
    /// Use an in-memory TOML string
    Embedded(&'a str),
}

/// Reads a number that may have been written as an integer or a float.
fn get_number(table: &Value, key: &str) -> Option<f32> {
    let value = table.get(key)?;
    value
        .as_float()
        .map(|f| f as f32)
        .or_else(|| value.as_integer().map(|i| i as f32))
}

fn get_positive(table: &Value, key: &str) -> Option<f32> {
    get_number(table, key).filter(|v| v.is_finite() && *v > 0.0)
}

fn parse_color(table: &Value, key: &str) -> Option<Color> {
    let raw = table.get(key)?.as_str()?;
    let parsed = Color::from_hex(raw);
    if parsed.is_none() {
        warn!("Ignoring color {}={:?}: expected #rrggbb", key, raw);
    }
    parsed
}

fn parse_font(table: &Value, key: &str) -> Option<FontFamily> {
    table
        .get(key)
        .and_then(|v| v.as_str())
        .map(FontFamily::from_name)
}

fn apply_layout(theme: &mut Theme, section: &Value) {
    let layout = &mut theme.layout;
    if let Some(margin) = get_number(section, "margin").filter(|m| *m >= 0.0) {
        layout.margin = margin;
    }
    if let Some(width) = get_positive(section, "slide_width") {
        layout.slide_width = width;
    }
    if let Some(height) = get_positive(section, "slide_height") {
        layout.slide_height = height;
    }
    if let Some(raw) = section.get("orientation").and_then(|v| v.as_str()) {
        match Orientation::parse(raw) {
            Some(orientation) => layout.orientation = orientation,
            None => warn!("Unknown orientation {:?}, keeping {:?}", raw, layout.orientation),
        }
    }
}

fn apply_colors(theme: &mut Theme, section: &Value) {
    let colors = &mut theme.colors;
    if let Some(c) = parse_color(section, "primary") {
        colors.primary = c;
    }
    if let Some(c) = parse_color(section, "secondary") {
        colors.secondary = c;
    }
    if let Some(c) = parse_color(section, "background") {
        colors.background = c;
    }
    if let Some(c) = parse_color(section, "text") {
        colors.text = c;
    }
}

fn apply_fonts(theme: &mut Theme, section: &Value) {
    if let Some(f) = parse_font(section, "body") {
        theme.fonts.body = f;
    }
    if let Some(f) = parse_font(section, "heading") {
        theme.fonts.heading = f;
    }
    if let Some(f) = parse_font(section, "code") {
        theme.fonts.code = f;
    }
}

fn apply_text_sizes(theme: &mut Theme, section: &Value) {
    let sizes = &mut theme.sizes;
    if let Some(v) = get_positive(section, "paragraph_size") {
        sizes.paragraph = v;
    }
    if let Some(v) = get_positive(section, "list_size") {
        sizes.list = v;
    }
    if let Some(v) = get_positive(section, "table_size") {
        sizes.table = v;
    }
    if let Some(v) = get_positive(section, "code_size") {
        sizes.code = v;
    }
    if let Some(v) = get_positive(section, "body_size") {
        sizes.body = v;
    }
}

fn apply_diagram(theme: &mut Theme, section: &Value) {
    let diagram = &mut theme.diagram;
    if let Some(tool) = section.get("tool").and_then(|v| v.as_str()) {
        diagram.tool = tool.to_string();
    }
    if let Some(width) = get_positive(section, "width") {
        diagram.width = width as u32;
    }
    if let Some(height) = get_positive(section, "height") {
        diagram.height = height as u32;
    }
    if let Some(name) = section.get("theme").and_then(|v| v.as_str()) {
        diagram.theme = name.to_string();
    }
    if let Some(bg) = section.get("background").and_then(|v| v.as_str()) {
        diagram.background = bg.to_string();
    }
    if let Some(remote) = section.get("remote").and_then(|v| v.as_bool()) {
        diagram.remote = remote;
    }
    if let Some(endpoint) = section.get("endpoint").and_then(|v| v.as_str()) {
        diagram.endpoint = endpoint.to_string();
    }
    if let Some(secs) = get_positive(section, "timeout_secs") {
        diagram.timeout = Duration::from_secs_f32(secs);
    }
}

/// Parses a theme from a TOML string.
///
/// Invalid TOML yields the default theme. Unknown sections and keys are
/// ignored.
///
/// ```rust
/// use slidepress::config::parse_config_string;
/// use slidepress::styling::Orientation;
///
/// let theme = parse_config_string(r#"
///     [layout]
///     margin = 36
///     orientation = "landscape"
/// "#);
/// assert_eq!(theme.layout.margin, 36.0);
/// assert_eq!(theme.layout.orientation, Orientation::Landscape);
/// assert_eq!(theme.layout.page_size(), (792.0, 612.0));
/// ```
pub fn parse_config_string(config_str: &str) -> Theme {
    let config: Value = match toml::from_str(config_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid theme TOML, using defaults: {}", e);
            return Theme::default();
        }
    };

    let mut theme = Theme::default();
    if let Some(section) = config.get("layout") {
        apply_layout(&mut theme, section);
    }
    if let Some(section) = config.get("colors") {
        apply_colors(&mut theme, section);
    }
    if let Some(section) = config.get("fonts") {
        apply_fonts(&mut theme, section);
    }
    if let Some(section) = config.get("text") {
        apply_text_sizes(&mut theme, section);
    }
    if let Some(section) = config.get("diagram") {
        apply_diagram(&mut theme, section);
    }
    theme
}

/// Loads the theme for the given source. A missing or unreadable file falls
/// back to the default theme.
pub fn load_config_from_source(source: ConfigSource) -> Theme {
    match source {
        ConfigSource::Default => Theme::default(),
        ConfigSource::File(path) => match fs::read_to_string(Path::new(path)) {
            Ok(s) => parse_config_string(&s),
            Err(e) => {
                warn!("Could not read theme file {}: {}", path, e);
                Theme::default()
            }
        },
        ConfigSource::Embedded(content) => parse_config_string(content),
    }
}

/// The default theme written out as TOML, suitable as a starting point for a
/// custom theme file.
pub fn default_config_toml() -> String {
    let theme = Theme::default();
    let hex = |c: Color| format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b);
    let family = |f: FontFamily| match f {
        FontFamily::Helvetica => "Helvetica",
        FontFamily::Times => "Times",
        FontFamily::Courier => "Courier",
    };
    let orientation = match theme.layout.orientation {
        Orientation::Portrait => "portrait",
        Orientation::Landscape => "landscape",
    };

    format!(
        r#"[layout]
margin = {margin:.1}
slide_width = {width:.1}
slide_height = {height:.1}
orientation = "{orientation}"

[colors]
primary = "{primary}"
secondary = "{secondary}"
background = "{background}"
text = "{text}"

[fonts]
body = "{body}"
heading = "{heading}"
code = "{code}"

[text]
paragraph_size = {paragraph:.1}
list_size = {list:.1}
table_size = {table:.1}
code_size = {code_size:.1}
body_size = {body_size:.1}

[diagram]
tool = "{tool}"
width = {dwidth}
height = {dheight}
theme = "{dtheme}"
background = "{dbackground}"
remote = {remote}
endpoint = "{endpoint}"
timeout_secs = {timeout}
"#,
        margin = theme.layout.margin,
        width = theme.layout.slide_width,
        height = theme.layout.slide_height,
        orientation = orientation,
        primary = hex(theme.colors.primary),
        secondary = hex(theme.colors.secondary),
        background = hex(theme.colors.background),
        text = hex(theme.colors.text),
        body = family(theme.fonts.body),
        heading = family(theme.fonts.heading),
        code = family(theme.fonts.code),
        paragraph = theme.sizes.paragraph,
        list = theme.sizes.list,
        table = theme.sizes.table,
        code_size = theme.sizes.code,
        body_size = theme.sizes.body,
        tool = theme.diagram.tool,
        dwidth = theme.diagram.width,
        dheight = theme.diagram.height,
        dtheme = theme.diagram.theme,
        dbackground = theme.diagram.background,
        remote = theme.diagram.remote,
        endpoint = theme.diagram.endpoint,
        timeout = theme.diagram.timeout.as_secs(),
    )
}
