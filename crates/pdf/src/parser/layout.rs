//! Line grouping and block assembly.
//!
//! Turns the flat span list produced by the content interpreter into the
//! page's reading structure.  Every function here is a pure transformation.
//!
//! # Pipeline
//!
//! ```text
//! TextSpan[]  ->  TextLine[]  ->  TextBlock[]
//!                 group_spans      group_lines
//! ```

use std::collections::HashMap;

use crate::types::{Rect, TextBlock, TextLine, TextSpan};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Two spans whose baselines differ by less than this are treated as
/// belonging to the same line.
const Y_TOLERANCE: f32 = 1.0;

/// When grouping lines into blocks, a baseline gap larger than this multiple
/// of the line's font size starts a new block.
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// Minimum gap (in points) between adjacent spans before a space is implied.
pub const MIN_WORD_GAP: f32 = 1.5;

// ---------------------------------------------------------------------------
// CJK / spaceless-script helper
// ---------------------------------------------------------------------------

/// Returns `true` if `c` belongs to a script that does not use inter-word
/// spaces (CJK Unified Ideographs, Hiragana, Katakana, Hangul, Thai, etc.).
pub fn is_spaceless_script_char(c: char) -> bool {
    let cp = c as u32;
    matches!(
        cp,
        // CJK Unified Ideographs
        0x4E00..=0x9FFF
        // CJK Unified Ideographs Extension A
        | 0x3400..=0x4DBF
        // CJK Unified Ideographs Extension B
        | 0x20000..=0x2A6DF
        // CJK Compatibility Ideographs
        | 0xF900..=0xFAFF
        // Hiragana
        | 0x3040..=0x309F
        // Katakana
        | 0x30A0..=0x30FF
        // Hangul Syllables
        | 0xAC00..=0xD7AF
        // CJK Symbols and Punctuation
        | 0x3000..=0x303F
        // Fullwidth Forms
        | 0xFF00..=0xFFEF
        // Thai
        | 0x0E00..=0x0E7F
    )
}

/// True when text joined across `prev` / `next` needs an implied space:
/// neither side is already whitespace and the boundary is not between two
/// spaceless-script characters.
pub fn needs_space_between(prev: &str, next: &str) -> bool {
    match (prev.chars().next_back(), next.chars().next()) {
        (Some(l), Some(f)) => {
            !l.is_whitespace()
                && !f.is_whitespace()
                && !(is_spaceless_script_char(l) && is_spaceless_script_char(f))
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Public API: span -> line grouping
// ---------------------------------------------------------------------------

/// Group a flat list of [`TextSpan`]s into [`TextLine`]s.
///
/// Spans whose baselines are within [`Y_TOLERANCE`] points of each other are
/// placed on the same line.  Lines come out top to bottom, spans within a
/// line left to right.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    if spans.is_empty() {
        return Vec::new();
    }

    // Top of page first (y grows downward), then X ascending.
    spans.sort_by(|a, b| {
        a.origin
            .y
            .partial_cmp(&b.origin.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.origin
                    .x
                    .partial_cmp(&b.origin.x)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current_spans: Vec<TextSpan> = Vec::new();
    let mut current_y = spans[0].origin.y;

    for span in spans {
        if (span.origin.y - current_y).abs() <= Y_TOLERANCE {
            current_spans.push(span);
        } else {
            if let Some(line) = assemble_line(std::mem::take(&mut current_spans)) {
                lines.push(line);
            }
            current_y = span.origin.y;
            current_spans.push(span);
        }
    }

    if let Some(line) = assemble_line(current_spans) {
        lines.push(line);
    }

    lines
}

/// Build a [`TextLine`] from spans known to share a baseline.
fn assemble_line(mut spans: Vec<TextSpan>) -> Option<TextLine> {
    spans.sort_by(|a, b| {
        a.bbox
            .x0
            .partial_cmp(&b.bbox.x0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let bbox = union_all(spans.iter().map(|s| s.bbox))?;
    let baseline = spans.first().map(|s| s.origin.y).unwrap_or(bbox.y1);
    let font_size = dominant_font_size(&spans);

    Some(TextLine {
        spans,
        bbox,
        baseline,
        font_size,
    })
}

/// Returns the font size that covers the most characters in the spans.
fn dominant_font_size(spans: &[TextSpan]) -> f32 {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for s in spans {
        let key = (s.font_size * 100.0).round() as i32;
        *counts.entry(key).or_insert(0) += s.text.chars().count();
    }
    counts
        .into_iter()
        .max_by_key(|(k, c)| (*c, *k))
        .map(|(k, _)| k as f32 / 100.0)
        .unwrap_or(0.0)
}

fn union_all(rects: impl Iterator<Item = Rect>) -> Option<Rect> {
    rects.reduce(|a, b| a.union(&b))
}

// ---------------------------------------------------------------------------
// Public API: line -> block grouping
// ---------------------------------------------------------------------------

/// Group consecutive [`TextLine`]s into [`TextBlock`]s.
///
/// A new block starts when:
/// - The baseline gap between consecutive lines exceeds
///   [`BLOCK_GAP_FACTOR`] times the previous line's font size.
/// - The new line does not overlap the block horizontally (another column).
pub fn group_lines_into_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut current_lines: Vec<TextLine> = Vec::new();

    for line in lines {
        let starts_block = match current_lines.last() {
            Some(prev) => {
                let gap = line.baseline - prev.baseline;
                let gap_break = gap > prev.font_size.max(1.0) * BLOCK_GAP_FACTOR;
                let column_break = line.bbox.x0 > prev.bbox.x1 || line.bbox.x1 < prev.bbox.x0;
                gap_break || column_break
            }
            None => false,
        };

        if starts_block {
            blocks.extend(assemble_block(std::mem::take(&mut current_lines)));
        }
        current_lines.push(line);
    }

    blocks.extend(assemble_block(current_lines));
    blocks
}

fn assemble_block(lines: Vec<TextLine>) -> Option<TextBlock> {
    let bbox = union_all(lines.iter().map(|l| l.bbox))?;
    Some(TextBlock { lines, bbox })
}

/// Run the complete layout pipeline on one page's spans.
pub fn analyze(spans: Vec<TextSpan>) -> Vec<TextBlock> {
    group_lines_into_blocks(group_spans_into_lines(spans))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
