//! Theme model consumed by the layout engine.
//!
//! A [`Theme`] is plain data: page geometry, colors, font families and the
//! handful of sizes the block converter needs. Nothing in the layout code
//! branches on which theme is active; it only reads these values.

use std::time::Duration;

/// An RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (the leading `#` is optional). Returns `None` for
    /// anything else, including the three-digit shorthand.
    ///
    /// ```
    /// use slidepress::styling::Color;
    /// assert_eq!(Color::from_hex("#2563eb"), Some(Color::rgb(0x25, 0x63, 0xeb)));
    /// assert_eq!(Color::from_hex("fff"), None);
    /// ```
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Channels scaled to the 0.0..=1.0 range PDF color operators expect.
    pub fn as_unit_rgb(&self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

/// Page orientation. Width and height from the theme are swapped so that
/// portrait is always taller than wide and landscape always wider than tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "portrait" => Some(Orientation::Portrait),
            "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }

    /// Applies the orientation to a `(width, height)` pair.
    ///
    /// ```
    /// use slidepress::styling::Orientation;
    /// assert_eq!(Orientation::Landscape.apply(612.0, 792.0), (792.0, 612.0));
    /// assert_eq!(Orientation::Portrait.apply(792.0, 612.0), (612.0, 792.0));
    /// ```
    pub fn apply(&self, width: f32, height: f32) -> (f32, f32) {
        let (short, long) = if width <= height {
            (width, height)
        } else {
            (height, width)
        };
        match self {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }
}

/// The PDF base-14 families the writer can emit without embedding fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Maps a user supplied family name onto a base-14 family. Unknown names
    /// land on Helvetica; anything that looks monospaced lands on Courier.
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("courier") || lower.contains("mono") {
            FontFamily::Courier
        } else if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            FontFamily::Times
        } else {
            FontFamily::Helvetica
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub margin: f32,
    pub slide_width: f32,
    pub slide_height: f32,
    pub orientation: Orientation,
}

impl PageLayout {
    /// Final page size after the orientation rule.
    pub fn page_size(&self) -> (f32, f32) {
        self.orientation.apply(self.slide_width, self.slide_height)
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            margin: 72.0,
            slide_width: 612.0,
            slide_height: 792.0,
            orientation: Orientation::Portrait,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub background: Color,
    pub text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: Color::rgb(0x25, 0x63, 0xeb),
            secondary: Color::rgb(0x64, 0x74, 0x8b),
            background: Color::WHITE,
            text: Color::rgb(0x1e, 0x29, 0x3b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fonts {
    pub body: FontFamily,
    pub heading: FontFamily,
    pub code: FontFamily,
}

impl Default for Fonts {
    fn default() -> Self {
        Self {
            body: FontFamily::Helvetica,
            heading: FontFamily::Helvetica,
            code: FontFamily::Courier,
        }
    }
}

/// Font sizes in points for the block kinds that do not derive their size
/// from a heading level.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSizes {
    pub paragraph: f32,
    pub list: f32,
    pub table: f32,
    pub code: f32,
    pub body: f32,
}

impl Default for TextSizes {
    fn default() -> Self {
        Self {
            paragraph: 14.0,
            list: 12.0,
            table: 12.0,
            code: 10.0,
            body: 12.0,
        }
    }
}

/// Fixed colors of code boxes, tables and diagram fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxColors {
    pub border: Color,
    pub code_fill: Color,
    pub badge_fill: Color,
    pub badge_text: Color,
    pub table_header_fill: Color,
    pub inline_code: Color,
}

impl Default for BoxColors {
    fn default() -> Self {
        Self {
            border: Color::rgb(0xcc, 0xcc, 0xcc),
            code_fill: Color::rgb(0xf8, 0xf8, 0xf8),
            badge_fill: Color::rgb(0xdd, 0xdd, 0xdd),
            badge_text: Color::rgb(0x66, 0x66, 0x66),
            table_header_fill: Color::rgb(0xf0, 0xf0, 0xf0),
            inline_code: Color::rgb(0x66, 0x66, 0x66),
        }
    }
}

/// Settings for the diagram rendering chain.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSettings {
    /// Program name or path of the mermaid command line tool.
    pub tool: String,
    pub width: u32,
    pub height: u32,
    pub theme: String,
    pub background: String,
    /// Whether the remote tier may be used at all.
    pub remote: bool,
    /// Base URL; the base64 encoded source is appended to it.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            tool: "mmdc".to_string(),
            width: 600,
            height: 400,
            theme: "neutral".to_string(),
            background: "white".to_string(),
            remote: true,
            endpoint: "https://mermaid.ink/img/".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Theme {
    pub layout: PageLayout,
    pub colors: Palette,
    pub fonts: Fonts,
    pub sizes: TextSizes,
    pub boxes: BoxColors,
    pub diagram: DiagramSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#000000"), Some(Color::BLACK));
        assert_eq!(Color::from_hex("FFFFFF"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn test_orientation_swap_rule() {
        assert_eq!(Orientation::Portrait.apply(612.0, 792.0), (612.0, 792.0));
        assert_eq!(Orientation::Landscape.apply(612.0, 792.0), (792.0, 612.0));
        assert_eq!(Orientation::Landscape.apply(792.0, 612.0), (792.0, 612.0));
        assert_eq!(Orientation::parse("LANDSCAPE"), Some(Orientation::Landscape));
        assert_eq!(Orientation::parse("sideways"), None);
    }

    #[test]
    fn test_font_family_mapping() {
        assert_eq!(FontFamily::from_name("Courier New"), FontFamily::Courier);
        assert_eq!(FontFamily::from_name("Space Mono"), FontFamily::Courier);
        assert_eq!(FontFamily::from_name("Times-Roman"), FontFamily::Times);
        assert_eq!(FontFamily::from_name("Noto Sans"), FontFamily::Helvetica);
        assert_eq!(FontFamily::from_name("Helvetica-Bold"), FontFamily::Helvetica);
    }

    #[test]
    fn test_default_page_size() {
        let layout = PageLayout::default();
        assert_eq!(layout.page_size(), (612.0, 792.0));
    }
}
