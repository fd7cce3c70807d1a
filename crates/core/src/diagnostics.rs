//! Non-fatal conditions raised while detecting, enriching and annotating.
//!
//! Components never log directly; they report into a [`DiagnosticSink`]
//! supplied by the caller, whose lifetime is one run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::model::{BlockKey, Rectangle};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No page of the document carried a highlight rectangle.
    NoHighlightsFound { filepath: PathBuf },
    /// The anchor for a block fell outside its page, or the page itself
    /// does not exist in the document.
    AnnotationOutOfBounds {
        key: BlockKey,
        point: (f32, f32),
        page_rect: Option<Rectangle>,
    },
    /// Writing the note for a block failed; the rest of the pass went on.
    AnnotationFailed { key: BlockKey, reason: String },
    /// A page carrying highlights has a `/Rotate`; its geometry is reported
    /// in unrotated page space.
    RotatedPage { page_num: usize, rotation: u16 },
    /// No text span intersected the block, so no font size is known.
    FontMetricUnavailable { key: BlockKey },
    /// The suggestion service produced nothing usable for a block.
    SuggestionUnavailable { key: BlockKey, reason: String },
    /// A suggestion was keyed to a block that does not exist.
    UnmatchedSuggestion { key: BlockKey },
}

impl Diagnostic {
    /// Whether the condition is worth a warning rather than an info line.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::NoHighlightsFound { .. }
                | Diagnostic::AnnotationOutOfBounds { .. }
                | Diagnostic::AnnotationFailed { .. }
                | Diagnostic::RotatedPage { .. }
                | Diagnostic::UnmatchedSuggestion { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoHighlightsFound { filepath } => write!(
                f,
                "no highlighted code blocks found in {}; was the document prepared with highlights?",
                filepath.display()
            ),
            Diagnostic::AnnotationOutOfBounds {
                key,
                point,
                page_rect: Some(rect),
            } => write!(
                f,
                "{}: anchor ({:.2}, {:.2}) lies outside page bounds [{:.2}, {:.2}, {:.2}, {:.2}]; annotation skipped",
                key, point.0, point.1, rect.x0, rect.y0, rect.x1, rect.y1
            ),
            Diagnostic::AnnotationOutOfBounds {
                key,
                page_rect: None,
                ..
            } => write!(f, "{}: page not present in document; annotation skipped", key),
            Diagnostic::AnnotationFailed { key, reason } => {
                write!(f, "{}: annotation not written ({})", key, reason)
            }
            Diagnostic::RotatedPage {
                page_num,
                rotation,
            } => write!(
                f,
                "p.{}: page is rotated {} degrees; positions are unrotated",
                page_num + 1,
                rotation
            ),
            Diagnostic::FontMetricUnavailable { key } => {
                write!(f, "{}: no text span found, font size unknown", key)
            }
            Diagnostic::SuggestionUnavailable { key, reason } => {
                write!(f, "{}: no suggestion ({})", key, reason)
            }
            Diagnostic::UnmatchedSuggestion { key } => {
                write!(f, "{}: suggestion does not match any detected block", key)
            }
        }
    }
}

/// Receiver for diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Collects the diagnostics of one run and logs each as it arrives.
#[derive(Debug, Default)]
pub struct Diagnostics {
    reports: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[Diagnostic] {
        &self.reports
    }

    pub fn warning_count(&self) -> usize {
        self.reports.iter().filter(|d| d.is_warning()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn into_reports(self) -> Vec<Diagnostic> {
        self.reports
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            log::warn!("{}", diagnostic);
        } else {
            log::info!("{}", diagnostic);
        }
        self.reports.push(diagnostic);
    }
}
