//! Stamping problem blocks back onto the source document as sticky notes.

use std::path::Path;

use pdf::{PdfDocument, Point, Rect};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::Result;
use crate::model::{ProblemCodeBlock, ProblemPdfPage};

/// Author shown on every note.
pub const ANNOTATION_TITLE: &str = "Margin Check";

pub const OVERFLOW_MESSAGE: &str = "Code running into margin.";

pub const SUGGESTION_HEADER: &str = "AI-generated reformatting suggestion:";

/// Note body for `block`. The suggestion is appended only when asked for
/// and present.
pub fn annotation_text(block: &ProblemCodeBlock, include_suggestions: bool) -> String {
    match block.suggested_reformat.as_deref() {
        Some(suggestion) if include_suggestions && !suggestion.is_empty() => {
            format!("{OVERFLOW_MESSAGE}\n\n{SUGGESTION_HEADER}\n\n{suggestion}")
        }
        _ => OVERFLOW_MESSAGE.to_string(),
    }
}

/// Top-right corner of the highlight.
pub fn anchor_point(block: &ProblemCodeBlock) -> Point {
    Point::new(block.allotted_rect.x1, block.allotted_rect.y0)
}

/// A document that accepts notes.
pub trait AnnotationTarget {
    /// Page bounds, or `None` when the page does not exist.
    fn page_rect(&self, page_num: usize) -> Option<Rect>;
    fn add_note(&mut self, page_num: usize, point: Point, contents: &str, title: &str)
        -> Result<()>;
}

impl AnnotationTarget for PdfDocument {
    fn page_rect(&self, page_num: usize) -> Option<Rect> {
        PdfDocument::page_rect(self, page_num).ok()
    }

    fn add_note(
        &mut self,
        page_num: usize,
        point: Point,
        contents: &str,
        title: &str,
    ) -> Result<()> {
        self.add_text_annotation(page_num, point, contents, title)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub written: usize,
    /// Anchor outside the page, or page missing.
    pub skipped: usize,
    /// The document refused the note.
    pub failed: usize,
}

/// Add one note per block, pages and blocks in stored order.
///
/// Blocks whose anchor falls outside their page, and blocks whose note could
/// not be written, are reported and skipped. Pages not named in `pages` are
/// left alone.
pub fn annotate_document<T: AnnotationTarget + ?Sized>(
    target: &mut T,
    pages: &[ProblemPdfPage],
    include_suggestions: bool,
    sink: &mut dyn DiagnosticSink,
) -> AnnotationSummary {
    let mut summary = AnnotationSummary::default();

    for page in pages {
        let page_rect = target.page_rect(page.page_num);

        for (key, block) in page.keyed_blocks() {
            let point = anchor_point(block);
            let in_bounds = page_rect.is_some_and(|rect| rect.contains_point(point));
            if !in_bounds {
                sink.report(Diagnostic::AnnotationOutOfBounds {
                    key,
                    point: (point.x, point.y),
                    page_rect: page_rect.map(Into::into),
                });
                summary.skipped += 1;
                continue;
            }

            let contents = annotation_text(block, include_suggestions);
            match target.add_note(page.page_num, point, &contents, ANNOTATION_TITLE) {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    sink.report(Diagnostic::AnnotationFailed {
                        key,
                        reason: e.to_string(),
                    });
                    summary.failed += 1;
                }
            }
        }
    }

    log::debug!(
        "annotations written: {}, skipped: {}, failed: {}",
        summary.written,
        summary.skipped,
        summary.failed
    );
    summary
}

/// Open a fresh handle on `source` and annotate it. The caller decides
/// where to save the result.
pub fn annotate_pdf(
    pages: &[ProblemPdfPage],
    source: &Path,
    include_suggestions: bool,
    sink: &mut dyn DiagnosticSink,
) -> Result<(PdfDocument, AnnotationSummary)> {
    let mut document = PdfDocument::open(source)?;
    let summary = annotate_document(&mut document, pages, include_suggestions, sink);
    Ok((document, summary))
}
