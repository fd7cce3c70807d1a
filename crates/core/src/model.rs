use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Estimated glyph width as a fraction of the point size.
pub const CHAR_WIDTH_FACTOR: f32 = 0.5;

/// Axis-aligned box in page space (points, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Left edge.
    pub x0: f32,
    /// Right edge.
    pub x1: f32,
    /// Top edge.
    pub y0: f32,
    /// Bottom edge.
    pub y1: f32,
}

impl Rectangle {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

impl From<pdf::Rect> for Rectangle {
    fn from(r: pdf::Rect) -> Self {
        Rectangle::new(r.x0, r.y0, r.x1, r.y1)
    }
}

impl From<Rectangle> for pdf::Rect {
    fn from(r: Rectangle) -> Self {
        pdf::Rect::new(r.x0, r.y0, r.x1, r.y1)
    }
}

/// One region of text running past its highlight into the margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemCodeBlock {
    /// The highlight as drawn on the page.
    pub allotted_rect: Rectangle,
    /// The highlight widened to the page's right edge.
    pub full_text_rect: Rectangle,
    /// All text inside `full_text_rect`.
    pub full_text: String,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub suggested_reformat: Option<String>,
}

impl ProblemCodeBlock {
    /// Monospace-equivalent characters that fit across the highlight,
    /// `floor(width / (font_size * 0.5))`.
    pub fn chars_fit(&self) -> Option<u32> {
        let font_size = self.font_size.filter(|fs| *fs > 0.0)?;
        let est_char_width = font_size * CHAR_WIDTH_FACTOR;
        Some((self.allotted_rect.width() / est_char_width).floor().max(0.0) as u32)
    }
}

/// All problem blocks found on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemPdfPage {
    pub filepath: PathBuf,
    /// 0-based page index in the source document.
    pub page_num: usize,
    pub problem_code_blocks: Vec<ProblemCodeBlock>,
}

impl ProblemPdfPage {
    /// Blocks paired with their stable keys, in stored order.
    pub fn keyed_blocks(&self) -> impl Iterator<Item = (BlockKey, &ProblemCodeBlock)> {
        self.problem_code_blocks
            .iter()
            .enumerate()
            .map(move |(block_index, block)| (BlockKey::new(self.page_num, block_index), block))
    }
}

/// Stable identity of a block: page index plus position on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub page_num: usize,
    pub block_index: usize,
}

impl BlockKey {
    pub fn new(page_num: usize, block_index: usize) -> Self {
        Self {
            page_num,
            block_index,
        }
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p.{} block {}", self.page_num + 1, self.block_index + 1)
    }
}
