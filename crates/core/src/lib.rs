//! Core library for margincheck
//!
//! This crate implements the **Functional Core** of the margincheck application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`pdf`**: PDF structural parsing (drawings, text spans, clipped text) and
//!   annotation writing on top of `lopdf`
//! - **`margincheck_core`** (this crate): overflow detection, annotation
//!   placement, reporting and the pure half of the suggestion step
//! - **`margincheck`**: CLI, model calls and file orchestration (the Imperative Shell)
//!
//! Detection and annotation work against small traits ([`detect::PageView`],
//! [`detect::PageSource`], [`annotate::AnnotationTarget`]) so they can be
//! tested with fixture pages. Non-fatal conditions are reported into a
//! [`diagnostics::DiagnosticSink`] owned by the caller.
//!
//! The `*_path`, [`annotate::annotate_pdf`] and [`snapshot`] save/load helpers
//! are the only functions here that touch the filesystem.
//!
//! # Module Organization
//!
//! - [`model`]: problem pages and blocks, as persisted
//! - [`detect`]: finds highlighted code blocks that run into the margin
//! - [`annotate`]: writes a sticky note for each problem block
//! - [`report`]: plain-text rendering of problem pages
//! - [`snapshot`]: JSON persistence of problem pages
//! - [`suggest`]: prompts for, and application of, reformatting suggestions
//! - [`diagnostics`]: non-fatal conditions raised along the way
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use margincheck_core::{detect, annotate, diagnostics::Diagnostics};
//!
//! let mut diagnostics = Diagnostics::new();
//! let pages = detect::detect_path(path, &mut diagnostics)?;
//! let (mut document, summary) = annotate::annotate_pdf(&pages, path, false, &mut diagnostics)?;
//! document.save(output)?;
//! ```

pub mod annotate;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod report;
pub mod snapshot;
pub mod suggest;

#[cfg(test)]
mod test_support;

pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics};
pub use error::{Error, Result};
pub use model::{BlockKey, ProblemCodeBlock, ProblemPdfPage, Rectangle};
