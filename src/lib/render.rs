//! Whole-document rendering: slide chrome, one slide after another, and the
//! speaker notes document.

use crate::blocks::BlockRenderer;
use crate::canvas::{Canvas, Page, PageDecorator, Rect, Span, Stroke, TextFlow};
use crate::diagram::DiagramChain;
use crate::markup::Presentation;
use crate::metrics::FontFace;
use crate::pdf::{DocumentInfo, Pdf};
use crate::styling::{Color, FontFamily, Theme};
use crate::SlideError;
use log::{debug, info};

const HEADER_HEIGHT: f32 = 50.0;
/// Distance from the top margin to the first line of slide content.
const CONTENT_OFFSET: f32 = 70.0;
/// Space kept free above the bottom margin for the footer.
const FOOTER_RESERVE: f32 = 100.0;
const FOOTER_RULE: f32 = 70.0;
const FOOTER_BASELINE: f32 = 52.0;

/// A4 in points.
const NOTES_PAGE: (f32, f32) = (595.28, 841.89);
const NOTES_MARGIN: f32 = 72.0;

/// Laid-out pages plus the information needed to write them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub pages: Vec<Page>,
    pub info: DocumentInfo,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_pdf(self) -> Pdf {
        Pdf::new(self.pages, self.info)
    }
}

/// Header and footer drawn on every page of one slide.
struct SlideChrome {
    title: String,
    author: String,
    date: String,
    number: usize,
    total: usize,
    margin: f32,
    family: FontFamily,
    heading_family: FontFamily,
    primary: Color,
    secondary: Color,
    text: Color,
}

impl PageDecorator for SlideChrome {
    fn decorate(&self, canvas: &mut Canvas, _page_number: usize) -> Rect {
        let (width, height) = canvas.page_size();
        let left = self.margin;
        let right = width - self.margin;
        let top = height - self.margin;
        let bottom = self.margin;
        let rule = Stroke::new(self.secondary, 1.0);

        canvas.draw_text_at(
            left,
            top - 16.0 * 0.9,
            &self.title,
            FontFace::styled(self.heading_family, true, false),
            16.0,
            self.primary,
        );
        canvas.draw_text_at(
            right - 100.0,
            top - 30.0,
            &format!("{} / {}", self.number, self.total),
            FontFace::regular(self.family),
            12.0,
            self.secondary,
        );
        canvas.draw_line((left, top - HEADER_HEIGHT), (right, top - HEADER_HEIGHT), rule);

        canvas.draw_line((left, bottom + FOOTER_RULE), (right, bottom + FOOTER_RULE), rule);
        let footer_face = FontFace::regular(self.family);
        canvas.draw_text_at(left, bottom + FOOTER_BASELINE, &self.author, footer_face, 10.0, self.text);
        canvas.draw_text_at(right - 100.0, bottom + FOOTER_BASELINE, &self.date, footer_face, 10.0, self.text);

        let content_top = top - CONTENT_OFFSET;
        let content_bottom = bottom + FOOTER_RESERVE;
        Rect::new(left, content_top, right - left, content_top - content_bottom)
    }
}

/// Lays out every slide of `presentation` on its own page or pages.
///
/// Block failures are annotated in place and never abort the document. The
/// only error is an empty slide list.
///
/// ```
/// use slidepress::diagram::DiagramChain;
/// use slidepress::markdown::parse_presentation;
/// use slidepress::render::render_presentation;
/// use slidepress::styling::Theme;
///
/// let deck = parse_presentation("---slide\n# One\n---slide\n# Two\n").unwrap();
/// let theme = Theme::default();
/// let diagrams = DiagramChain::with_tiers(Vec::new()).unwrap();
/// let doc = render_presentation(&deck, &theme, &diagrams).unwrap();
/// assert_eq!(doc.page_count(), 2);
/// ```
pub fn render_presentation(
    presentation: &Presentation,
    theme: &Theme,
    diagrams: &DiagramChain,
) -> Result<RenderedDocument, SlideError> {
    if presentation.slides.is_empty() {
        return Err(SlideError::EmptyPresentation);
    }

    let (width, height) = theme.layout.page_size();
    let mut canvas = Canvas::new(width, height, theme.layout.margin);
    canvas.set_background(Some(theme.colors.background));
    let renderer = BlockRenderer::new(theme, diagrams);
    let metadata = &presentation.metadata;
    let total = presentation.slides.len();

    for (index, slide) in presentation.slides.iter().enumerate() {
        canvas.set_decorator(Box::new(SlideChrome {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            date: metadata.date.clone(),
            number: index + 1,
            total,
            margin: theme.layout.margin,
            family: theme.fonts.body,
            heading_family: theme.fonts.heading,
            primary: theme.colors.primary,
            secondary: theme.colors.secondary,
            text: theme.colors.text,
        }));
        let first_page = canvas.page_count() + 1;
        canvas.start_new_page();
        renderer.render_blocks(&slide.content, &mut canvas);
        debug!(
            "Slide {} laid out on pages {}..={}",
            index + 1,
            first_page,
            canvas.page_count()
        );
    }

    info!("Rendered {} slides onto {} pages", total, canvas.page_count());
    Ok(RenderedDocument {
        pages: canvas.into_pages(),
        info: DocumentInfo {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
        },
    })
}

/// Lays out the speaker notes, or returns `None` when no slide has any.
pub fn render_notes(presentation: &Presentation, theme: &Theme, diagrams: &DiagramChain) -> Option<RenderedDocument> {
    if !presentation.has_notes() {
        return None;
    }

    let mut canvas = Canvas::new(NOTES_PAGE.0, NOTES_PAGE.1, NOTES_MARGIN);
    canvas.start_new_page();
    let renderer = BlockRenderer::new(theme, diagrams);
    let face = FontFace::styled(theme.fonts.heading, true, false);
    let color = theme.colors.text;
    let title = format!("{} - Speaker Notes", presentation.metadata.title);

    canvas.flow_text(&[Span::new(title.clone(), face, 18.0, color)], 0.0, TextFlow::Paginate);
    canvas.advance(20.0);

    for (index, slide) in presentation.slides.iter().enumerate() {
        let Some(notes) = slide.notes.as_ref().filter(|n| !n.is_empty()) else {
            continue;
        };
        if index != 0 {
            canvas.start_new_page();
        }
        let heading = format!(
            "Slide {}: {}",
            index + 1,
            slide.title().unwrap_or_else(|| "Slide".to_string())
        );
        canvas.flow_text(&[Span::new(heading, face, 14.0, color)], 0.0, TextFlow::Paginate);
        canvas.advance(10.0);
        renderer.render_blocks(notes, &mut canvas);
        canvas.advance(20.0);
    }

    Some(RenderedDocument {
        pages: canvas.into_pages(),
        info: DocumentInfo {
            title,
            author: presentation.metadata.author.clone(),
        },
    })
}
