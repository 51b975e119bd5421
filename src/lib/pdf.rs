//! PDF assembly.
//!
//! Turns the page list produced by the canvas into a PDF document with
//! lopdf. Only the base-14 fonts are used, so nothing is embedded: text is
//! encoded as WinAnsi and characters outside that set are transliterated.
//!
//! Images are read here, not when they were placed. A file that cannot be
//! decoded is drawn as a crossed-out placeholder box.

use crate::canvas::{DrawOp, Page, Rect, Stroke};
use crate::images::{self, RasterImage};
use crate::metrics::FontFace;
use crate::styling::Color;
use crate::SlideError;
use log::{debug, info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Control point distance for approximating a quarter circle with a cubic
/// Bézier curve.
const KAPPA: f32 = 0.5523;

/// Title and author written to the document information dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
}

/// Encodes a character as WinAnsi. Characters outside the code page are
/// transliterated; anything left over becomes `?`.
fn push_win_ansi(ch: char, out: &mut Vec<u8>) {
    let code = ch as u32;
    if (0x20..0x7f).contains(&code) || (0xa0..=0xff).contains(&code) {
        out.push(code as u8);
        return;
    }
    let special = match ch {
        '\u{20ac}' => Some(0x80),
        '\u{201a}' => Some(0x82),
        '\u{0192}' => Some(0x83),
        '\u{201e}' => Some(0x84),
        '\u{2026}' => Some(0x85),
        '\u{2020}' => Some(0x86),
        '\u{2021}' => Some(0x87),
        '\u{02c6}' => Some(0x88),
        '\u{2030}' => Some(0x89),
        '\u{0160}' => Some(0x8a),
        '\u{2039}' => Some(0x8b),
        '\u{0152}' => Some(0x8c),
        '\u{017d}' => Some(0x8e),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201c}' => Some(0x93),
        '\u{201d}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\u{02dc}' => Some(0x98),
        '\u{2122}' => Some(0x99),
        '\u{0161}' => Some(0x9a),
        '\u{203a}' => Some(0x9b),
        '\u{0153}' => Some(0x9c),
        '\u{017e}' => Some(0x9e),
        '\u{0178}' => Some(0x9f),
        '\t' => Some(b' '),
        _ => None,
    };
    match special {
        Some(byte) => out.push(byte),
        None => {
            let ascii = deunicode::deunicode_char(ch).unwrap_or("?");
            if ascii.is_empty() {
                out.push(b'?');
            } else {
                out.extend(ascii.bytes().filter(|b| (0x20..0x7f).contains(b)));
            }
        }
    }
}

/// Bytes for `text` in the encoding of `face`.
pub fn encode_text(text: &str, face: FontFace) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    match face {
        // The dingbat glyphs are addressed by their ASCII code.
        FontFace::Dingbats => out.extend(text.bytes().filter(|b| (0x20..0x7f).contains(b))),
        FontFace::Standard { .. } => {
            for ch in text.chars() {
                push_win_ansi(ch, &mut out);
            }
        }
    }
    out
}

/// Document information strings share the Latin-1 range with WinAnsi.
fn info_string(text: &str) -> Object {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        push_win_ansi(ch, &mut bytes);
    }
    Object::string_literal(bytes)
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn color_operands(color: Color) -> Vec<Object> {
    let (r, g, b) = color.as_unit_rgb();
    vec![real(r), real(g), real(b)]
}

/// Accumulates content stream operations for one page.
struct PageContent<'a> {
    ops: Vec<Operation>,
    fonts: &'a BTreeMap<FontFace, String>,
}

impl<'a> PageContent<'a> {
    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.ops.push(Operation::new(operator, operands));
    }

    fn set_paint(&mut self, fill: Option<Color>, stroke: Option<Stroke>) {
        if let Some(color) = fill {
            self.op("rg", color_operands(color));
        }
        if let Some(stroke) = stroke {
            self.op("RG", color_operands(stroke.color));
            self.op("w", vec![real(stroke.width)]);
        }
    }

    fn paint(&mut self, fill: Option<Color>, stroke: Option<Stroke>) {
        let operator = match (fill.is_some(), stroke.is_some()) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => "n",
        };
        self.op(operator, vec![]);
    }

    fn rect(&mut self, rect: &Rect, fill: Option<Color>, stroke: Option<Stroke>) {
        self.op("q", vec![]);
        self.set_paint(fill, stroke);
        self.op(
            "re",
            vec![real(rect.x), real(rect.bottom()), real(rect.width), real(rect.height)],
        );
        self.paint(fill, stroke);
        self.op("Q", vec![]);
    }

    fn rounded_rect(&mut self, rect: &Rect, radius: f32, fill: Option<Color>, stroke: Option<Stroke>) {
        if radius <= 0.0 {
            self.rect(rect, fill, stroke);
            return;
        }
        let (x, b, t, r) = (rect.x, rect.bottom(), rect.y, rect.right());
        let k = KAPPA * radius;
        self.op("q", vec![]);
        self.set_paint(fill, stroke);
        self.op("m", vec![real(x + radius), real(b)]);
        self.op("l", vec![real(r - radius), real(b)]);
        self.op(
            "c",
            vec![real(r - radius + k), real(b), real(r), real(b + radius - k), real(r), real(b + radius)],
        );
        self.op("l", vec![real(r), real(t - radius)]);
        self.op(
            "c",
            vec![real(r), real(t - radius + k), real(r - radius + k), real(t), real(r - radius), real(t)],
        );
        self.op("l", vec![real(x + radius), real(t)]);
        self.op(
            "c",
            vec![real(x + radius - k), real(t), real(x), real(t - radius + k), real(x), real(t - radius)],
        );
        self.op("l", vec![real(x), real(b + radius)]);
        self.op(
            "c",
            vec![real(x), real(b + radius - k), real(x + radius - k), real(b), real(x + radius), real(b)],
        );
        self.op("h", vec![]);
        self.paint(fill, stroke);
        self.op("Q", vec![]);
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) {
        self.op("q", vec![]);
        self.set_paint(None, Some(stroke));
        self.op("m", vec![real(from.0), real(from.1)]);
        self.op("l", vec![real(to.0), real(to.1)]);
        self.op("S", vec![]);
        self.op("Q", vec![]);
    }

    fn text(&mut self, x: f32, y: f32, text: &str, face: FontFace, size: f32, color: Color) {
        let Some(name) = self.fonts.get(&face) else {
            warn!("No font resource for {:?}, text dropped", face);
            return;
        };
        let name = name.clone();
        self.op("BT", vec![]);
        self.op("Tf", vec![Object::Name(name.into_bytes()), real(size)]);
        self.op("rg", color_operands(color));
        self.op("Td", vec![real(x), real(y)]);
        self.op(
            "Tj",
            vec![Object::String(encode_text(text, face), StringFormat::Literal)],
        );
        self.op("ET", vec![]);
    }

    fn image(&mut self, name: &str, rect: &Rect) {
        self.op("q", vec![]);
        self.op(
            "cm",
            vec![
                real(rect.width),
                real(0.0),
                real(0.0),
                real(rect.height),
                real(rect.x),
                real(rect.bottom()),
            ],
        );
        self.op("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.op("Q", vec![]);
    }

    fn placeholder(&mut self, rect: &Rect) {
        let stroke = Stroke::new(Color::rgb(0x99, 0x99, 0x99), 0.5);
        self.rect(rect, None, Some(stroke));
        self.line((rect.x, rect.y), (rect.right(), rect.bottom()), stroke);
        self.line((rect.x, rect.bottom()), (rect.right(), rect.y), stroke);
    }
}

/// Builds PDFs from laid-out pages.
pub struct Pdf {
    pages: Vec<Page>,
    info: DocumentInfo,
}

impl Pdf {
    pub fn new(pages: Vec<Page>, info: DocumentInfo) -> Self {
        Self { pages, info }
    }

    fn used_fonts(&self) -> BTreeMap<FontFace, String> {
        let faces: BTreeSet<FontFace> = self
            .pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter_map(|op| match op {
                DrawOp::Text { face, .. } => Some(*face),
                _ => None,
            })
            .collect();
        faces
            .into_iter()
            .enumerate()
            .map(|(i, face)| (face, format!("F{}", i + 1)))
            .collect()
    }

    fn font_dictionary(doc: &mut Document, fonts: &BTreeMap<FontFace, String>) -> Dictionary {
        let mut dict = Dictionary::new();
        for (face, name) in fonts {
            let mut font = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
            };
            if matches!(face, FontFace::Standard { .. }) {
                font.set("Encoding", "WinAnsiEncoding");
            }
            let id = doc.add_object(font);
            dict.set(name.as_bytes().to_vec(), id);
        }
        dict
    }

    fn add_image(doc: &mut Document, image: &RasterImage) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        };
        if let Some(alpha) = &image.alpha {
            let mut mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8i64,
                },
                alpha.clone(),
            );
            if let Err(e) = mask.compress() {
                debug!("Alpha mask left uncompressed: {}", e);
            }
            dict.set("SMask", doc.add_object(mask));
        }
        let mut stream = Stream::new(dict, image.rgb.clone());
        if let Err(e) = stream.compress() {
            debug!("Image left uncompressed: {}", e);
        }
        doc.add_object(stream)
    }

    /// Loads each distinct image once. Failed loads map to `None`.
    fn load_images(&self, doc: &mut Document) -> HashMap<PathBuf, Option<ObjectId>> {
        let mut loaded: HashMap<PathBuf, Option<ObjectId>> = HashMap::new();
        for op in self.pages.iter().flat_map(|p| &p.ops) {
            if let DrawOp::Image { image, .. } = op {
                if loaded.contains_key(&image.path) {
                    continue;
                }
                let id = match images::load_for_embedding(image) {
                    Ok(raster) => Some(Self::add_image(doc, &raster)),
                    Err(e) => {
                        warn!("Image {} replaced by a placeholder: {}", image.path.display(), e);
                        None
                    }
                };
                loaded.insert(image.path.clone(), id);
            }
        }
        loaded
    }

    fn page_content(
        page: &Page,
        fonts: &BTreeMap<FontFace, String>,
        images: &HashMap<PathBuf, Option<ObjectId>>,
        xobjects: &mut Dictionary,
    ) -> Vec<Operation> {
        let mut content = PageContent {
            ops: Vec::new(),
            fonts,
        };
        if let Some(background) = page.background {
            content.rect(&Rect::new(0.0, page.height, page.width, page.height), Some(background), None);
        }
        let mut names: HashMap<&Path, String> = HashMap::new();

        for op in &page.ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    text,
                    face,
                    size,
                    color,
                } => content.text(*x, *y, text, *face, *size, *color),
                DrawOp::Rect { rect, fill, stroke } => content.rect(rect, *fill, *stroke),
                DrawOp::RoundedRect {
                    rect,
                    radius,
                    fill,
                    stroke,
                } => content.rounded_rect(rect, *radius, *fill, *stroke),
                DrawOp::Line { from, to, stroke } => content.line(*from, *to, *stroke),
                DrawOp::Image { rect, image } => match images.get(&image.path).copied().flatten() {
                    Some(id) => {
                        let next = format!("Im{}", names.len() + 1);
                        let name = names.entry(image.path.as_path()).or_insert(next).clone();
                        xobjects.set(name.as_bytes().to_vec(), id);
                        content.image(&name, rect);
                    }
                    None => content.placeholder(rect),
                },
            }
        }
        content.ops
    }

    /// Assembles the document.
    pub fn render_into_document(&self) -> Result<Document, SlideError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let fonts = self.used_fonts();
        let font_dict = Self::font_dictionary(&mut doc, &fonts);
        let images = self.load_images(&mut doc);

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut xobjects = Dictionary::new();
            let operations = Self::page_content(page, &fonts, &images, &mut xobjects);
            let encoded = Content { operations }.encode().map_err(|e| SlideError::PdfError {
                message: format!("Failed to encode page content: {}", e),
                path: None,
                suggestion: None,
            })?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let mut resources = dictionary! { "Font" => font_dict.clone() };
            if !xobjects.is_empty() {
                resources.set("XObject", xobjects);
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), real(page.width), real(page.height)],
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(dictionary! {
            "Title" => info_string(&self.info.title),
            "Author" => info_string(&self.info.author),
            "Producer" => Object::string_literal("slidepress"),
        });
        doc.trailer.set("Info", info_id);

        doc.compress();
        info!("Assembled PDF with {} pages", count);
        Ok(doc)
    }

    /// Writes the document to `path`.
    pub fn render(&self, path: &Path) -> Result<(), SlideError> {
        let mut doc = self.render_into_document()?;
        doc.save(path).map_err(|e| {
            let message = e.to_string();
            SlideError::PdfError {
                suggestion: Some(if message.contains("Permission") || message.contains("denied") {
                    "Check that you have write permissions for this location".to_string()
                } else if message.contains("No such file") {
                    "Make sure the output directory exists".to_string()
                } else {
                    "Try a different output path or check available disk space".to_string()
                }),
                message,
                path: Some(path.display().to_string()),
            }
        })?;
        Ok(())
    }

    /// Returns the document as bytes.
    pub fn render_to_bytes(&self) -> Result<Vec<u8>, SlideError> {
        let mut doc = self.render_into_document()?;
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).map_err(|e| SlideError::PdfError {
            message: e.to_string(),
            path: None,
            suggestion: Some("Check available memory and try with a smaller document".to_string()),
        })?;
        Ok(buffer)
    }
}
