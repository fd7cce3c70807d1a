use thiserror::Error;

/// Errors that abort a detection or annotation run.
///
/// Everything non-fatal goes through the
/// [`DiagnosticSink`](crate::diagnostics::DiagnosticSink) instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read PDF document: {0}")]
    DocumentParse(#[from] pdf::PdfError),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
