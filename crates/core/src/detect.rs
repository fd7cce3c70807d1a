//! Overflow detection.
//!
//! A highlight is a yellow filled rectangle marking where a code block is
//! allowed to sit. The block overflows when the text inside the highlight
//! differs from the text inside the same box stretched to the page's right
//! edge.

use std::path::Path;

use pdf::{Drawing, DrawingKind, PdfDocument, Rect, Rgb, TextSpan};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::Result;
use crate::model::{BlockKey, ProblemCodeBlock, ProblemPdfPage};

/// Per-channel tolerance of the yellow test.
pub const YELLOW_TOLERANCE: f32 = 0.05;

/// `r ≈ 1`, `g ≈ 1` and `b ≈ 0` within `tolerance`.
pub fn is_yellow(color: &Rgb, tolerance: f32) -> bool {
    (color.r - 1.0).abs() < tolerance && (color.g - 1.0).abs() < tolerance && color.b < tolerance
}

/// What detection needs from an analysed page.
pub trait PageView {
    /// 0-based index in the document.
    fn index(&self) -> usize;
    fn rect(&self) -> Rect;
    fn drawings(&self) -> &[Drawing];
    /// Text whose characters sit inside `clip`.
    fn textbox(&self, clip: &Rect) -> String;
    /// Text spans in block, line, span order.
    fn spans(&self) -> Vec<&TextSpan>;
    /// `/Rotate` in degrees.
    fn rotation(&self) -> u16 {
        0
    }
}

impl PageView for pdf::Page {
    fn index(&self) -> usize {
        self.index
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn drawings(&self) -> &[Drawing] {
        &self.drawings
    }

    fn textbox(&self, clip: &Rect) -> String {
        pdf::Page::textbox(self, clip)
    }

    fn spans(&self) -> Vec<&TextSpan> {
        pdf::Page::spans(self).collect()
    }

    fn rotation(&self) -> u16 {
        self.rotation
    }
}

/// A page-addressable document.
pub trait PageSource {
    type Page: PageView;

    fn page_count(&self) -> usize;
    fn page(&self, index: usize) -> Result<Self::Page>;
}

impl PageSource for PdfDocument {
    type Page = pdf::Page;

    fn page_count(&self) -> usize {
        PdfDocument::page_count(self)
    }

    fn page(&self, index: usize) -> Result<pdf::Page> {
        Ok(PdfDocument::page(self, index)?)
    }
}

/// Yellow filled rectangles on the page, in drawing order.
pub fn highlight_rects<P: PageView + ?Sized>(page: &P) -> Vec<Rect> {
    page.drawings()
        .iter()
        .filter(|d| d.kind == DrawingKind::Fill)
        .filter(|d| d.fill.is_some_and(|c| is_yellow(&c, YELLOW_TOLERANCE)))
        .map(|d| d.rect)
        .collect()
}

/// Size of the first span, in layout order, touching `rect`.
fn first_font_size<P: PageView + ?Sized>(page: &P, rect: &Rect) -> Option<f32> {
    page.spans()
        .into_iter()
        .find(|span| span.bbox.intersects(rect))
        .map(|span| span.font_size)
}

fn check_highlight<P: PageView + ?Sized>(page: &P, allotted: Rect) -> Option<ProblemCodeBlock> {
    let full_text_rect = allotted.with_x1(page.rect().x1.max(allotted.x1));

    let clipped = page.textbox(&allotted);
    let full_text = page.textbox(&full_text_rect);
    if clipped == full_text {
        return None;
    }

    Some(ProblemCodeBlock {
        allotted_rect: allotted.into(),
        full_text_rect: full_text_rect.into(),
        full_text,
        font_size: first_font_size(page, &full_text_rect),
        suggested_reformat: None,
    })
}

fn detect_highlights<P: PageView + ?Sized>(
    page: &P,
    highlights: Vec<Rect>,
    filepath: &Path,
    sink: &mut dyn DiagnosticSink,
) -> Option<ProblemPdfPage> {
    let mut blocks = Vec::new();

    if !highlights.is_empty() && page.rotation() != 0 {
        sink.report(Diagnostic::RotatedPage {
            page_num: page.index(),
            rotation: page.rotation(),
        });
    }

    for allotted in highlights {
        let Some(block) = check_highlight(page, allotted) else {
            continue;
        };
        if block.font_size.is_none() {
            sink.report(Diagnostic::FontMetricUnavailable {
                key: BlockKey::new(page.index(), blocks.len()),
            });
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        return None;
    }

    log::debug!("page {}: {} overflowing blocks", page.index(), blocks.len());
    Some(ProblemPdfPage {
        filepath: filepath.to_path_buf(),
        page_num: page.index(),
        problem_code_blocks: blocks,
    })
}

/// Overflowing blocks on one page, or `None` when everything fits.
pub fn detect_page<P: PageView + ?Sized>(
    page: &P,
    filepath: &Path,
    sink: &mut dyn DiagnosticSink,
) -> Option<ProblemPdfPage> {
    detect_highlights(page, highlight_rects(page), filepath, sink)
}

/// Scan every page of `source` in order.
///
/// Reports [`Diagnostic::NoHighlightsFound`] once when no page carried a
/// highlight at all. A page that cannot be analysed aborts the scan with
/// [`Error::DocumentParse`](crate::Error::DocumentParse); no partial result
/// is returned.
pub fn detect<S: PageSource + ?Sized>(
    source: &S,
    filepath: &Path,
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<ProblemPdfPage>> {
    let mut problem_pages = Vec::new();
    let mut highlights_found = false;

    for index in 0..source.page_count() {
        let page = source.page(index)?;
        let highlights = highlight_rects(&page);
        highlights_found |= !highlights.is_empty();

        if let Some(problem_page) = detect_highlights(&page, highlights, filepath, sink) {
            problem_pages.push(problem_page);
        }
    }

    if !highlights_found {
        sink.report(Diagnostic::NoHighlightsFound {
            filepath: filepath.to_path_buf(),
        });
    }

    Ok(problem_pages)
}

/// Open the document at `path`, scan it and release it.
pub fn detect_path(path: &Path, sink: &mut dyn DiagnosticSink) -> Result<Vec<ProblemPdfPage>> {
    let document = PdfDocument::open(path)?;
    detect(&document, path, sink)
}
