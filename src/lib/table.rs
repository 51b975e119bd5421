//! Table layout.
//!
//! A table is laid out completely before anything is drawn, so a table that
//! cannot fit leaves no partial output behind and can be replaced by its
//! plain-text rendition.

use crate::canvas::{Canvas, Rect, Span, Stroke, TextFlow};
use crate::markup::{MarkupNode, NodeKind};
use crate::metrics::{self, FontFace};
use crate::styling::{Color, FontFamily};
use crate::LayoutError;
use log::{debug, warn};

/// Rows of cell text; the first row may be a header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableGrid {
    pub rows: Vec<Vec<String>>,
    pub header: bool,
}

impl TableGrid {
    pub fn new(rows: Vec<Vec<String>>, header: bool) -> Self {
        Self { rows, header }
    }

    /// Collects the cells of a `Table` node. Rows without cells are skipped.
    pub fn from_node(node: &MarkupNode) -> Self {
        let mut header = false;
        let mut rows = Vec::new();
        for row in node.children.iter().filter(|c| c.kind == NodeKind::TableRow) {
            let cells: Vec<&MarkupNode> = row
                .children
                .iter()
                .filter(|c| matches!(c.kind, NodeKind::TableCell { .. }))
                .collect();
            if cells.is_empty() {
                continue;
            }
            if rows.is_empty() {
                header = cells
                    .iter()
                    .any(|c| matches!(c.kind, NodeKind::TableCell { header: true }));
            }
            rows.push(cells.iter().map(|c| c.text_content().trim().to_string()).collect());
        }
        Self { rows, header }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row, in cells.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct TableStyle {
    pub family: FontFamily,
    pub size: f32,
    pub text: Color,
    pub border: Color,
    pub header_fill: Color,
    pub border_width: f32,
    /// Vertical and horizontal cell padding.
    pub padding: (f32, f32),
}

struct RowLayout {
    cells: Vec<Vec<String>>,
    height: f32,
}

struct TableLayout {
    columns: Vec<f32>,
    rows: Vec<RowLayout>,
}

fn face_for(style: &TableStyle, header_row: bool) -> FontFace {
    FontFace::styled(style.family, header_row, false)
}

fn column_widths(grid: &TableGrid, width: f32, style: &TableStyle) -> Result<Vec<f32>, LayoutError> {
    let count = grid.column_count();
    let pad = 2.0 * style.padding.1;
    let mut natural = vec![pad; count];
    let mut minimum = vec![pad; count];

    for (r, row) in grid.rows.iter().enumerate() {
        let face = face_for(style, grid.header && r == 0);
        for (c, cell) in row.iter().enumerate() {
            let text_w = metrics::text_width(cell, face, style.size);
            let word_w = cell
                .split_whitespace()
                .map(|w| metrics::text_width(w, face, style.size))
                .fold(0.0, f32::max);
            natural[c] = natural[c].max(text_w + pad);
            minimum[c] = minimum[c].max(word_w + pad);
        }
    }

    let natural_total: f32 = natural.iter().sum();
    if natural_total <= width {
        let scale = width / natural_total;
        return Ok(natural.iter().map(|w| w * scale).collect());
    }

    let min_total: f32 = minimum.iter().sum();
    if min_total > width {
        return Err(LayoutError::TableOverflow(format!(
            "{} columns need {:.0}pt but only {:.0}pt are available",
            count, min_total, width
        )));
    }
    let slack = width - min_total;
    let stretch_total: f32 = natural.iter().zip(&minimum).map(|(n, m)| n - m).sum();
    Ok(natural
        .iter()
        .zip(&minimum)
        .map(|(n, m)| {
            if stretch_total > 0.0 {
                m + slack * (n - m) / stretch_total
            } else {
                m + slack / count as f32
            }
        })
        .collect())
}

fn layout_table(grid: &TableGrid, bounds: Rect, style: &TableStyle) -> Result<TableLayout, LayoutError> {
    let columns = column_widths(grid, bounds.width, style)?;
    let (pad_v, pad_h) = style.padding;
    let line_height = metrics::line_height(style.size);

    let mut rows = Vec::with_capacity(grid.rows.len());
    for (r, row) in grid.rows.iter().enumerate() {
        let face = face_for(style, grid.header && r == 0);
        let cells: Vec<Vec<String>> = row
            .iter()
            .zip(&columns)
            .map(|(cell, w)| metrics::wrap_text(cell, face, style.size, w - 2.0 * pad_h))
            .collect();
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let height = lines as f32 * line_height + 2.0 * pad_v;
        if height > bounds.height {
            return Err(LayoutError::TableOverflow(format!(
                "row {} is {:.0}pt tall, more than a page",
                r + 1,
                height
            )));
        }
        rows.push(RowLayout { cells, height });
    }
    Ok(TableLayout { columns, rows })
}

fn draw_row(canvas: &mut Canvas, layout: &TableLayout, row: &RowLayout, header_row: bool, style: &TableStyle) {
    let (pad_v, pad_h) = style.padding;
    let top = canvas.cursor();
    let face = face_for(style, header_row);
    let fill = header_row.then_some(style.header_fill);
    let stroke = Some(Stroke::new(style.border, style.border_width));

    let mut x = canvas.bounds().x;
    for (lines, width) in row.cells.iter().zip(&layout.columns) {
        canvas.draw_rect(Rect::new(x, top, *width, row.height), fill, stroke);
        let mut baseline = top - pad_v - style.size * 0.9;
        for line in lines {
            canvas.draw_text_at(x + pad_h, baseline, line, face, style.size, style.text);
            baseline -= metrics::line_height(style.size);
        }
        x += width;
    }
    canvas.advance(row.height);
}

fn draw_table(canvas: &mut Canvas, grid: &TableGrid, layout: &TableLayout, style: &TableStyle) {
    for (r, row) in layout.rows.iter().enumerate() {
        let header_row = grid.header && r == 0;
        if canvas.ensure_space(row.height) && grid.header && r > 0 {
            draw_row(canvas, layout, &layout.rows[0], true, style);
        }
        draw_row(canvas, layout, row, header_row, style);
    }
}

fn draw_fallback(canvas: &mut Canvas, grid: &TableGrid, style: &TableStyle) {
    let face = FontFace::regular(style.family);
    let mut spans = vec![Span::new("Table content:\n", face, style.size, style.text)];
    for row in &grid.rows {
        spans.push(Span::new(format!("{}\n", row.join(" | ")), face, style.size, style.text));
    }
    canvas.flow_text(&spans, 0.0, TextFlow::Paginate);
}

/// Renders `grid` across the full width of the current bounds.
///
/// An empty grid draws nothing and leaves the cursor alone. A grid that
/// cannot be laid out is written as one pipe-joined line per row instead.
pub fn render_table(grid: &TableGrid, canvas: &mut Canvas, style: &TableStyle) {
    if grid.is_empty() {
        return;
    }
    canvas.advance(10.0);

    match layout_table(grid, canvas.bounds(), style) {
        Ok(layout) => {
            debug!(
                "Table {}x{} with column widths {:?}",
                grid.rows.len(),
                layout.columns.len(),
                layout.columns
            );
            draw_table(canvas, grid, &layout, style);
        }
        Err(e) => {
            warn!("Table layout failed, writing rows as text: {}", e);
            draw_fallback(canvas, grid, style);
        }
    }
    canvas.advance(10.0);
}
