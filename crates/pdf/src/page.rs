use crate::parser::layout::{needs_space_between, MIN_WORD_GAP};
use crate::types::{Drawing, Rect, TextBlock, TextSpan};

/// One analysed page: its box, painted paths and text blocks, all in
/// top-left page space.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based page index.
    pub index: usize,
    pub rect: Rect,
    pub drawings: Vec<Drawing>,
    pub blocks: Vec<TextBlock>,
    /// `/Rotate` in degrees (0, 90, 180 or 270). Geometry is not rotated.
    pub rotation: u16,
}

impl Page {
    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    pub fn height(&self) -> f32 {
        self.rect.height()
    }

    /// Every span on the page in block, line, span order.
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.spans.iter())
    }

    /// Text of the characters whose box centre lies inside `clip`.
    ///
    /// Lines are joined with `\n`; spans on one line are joined with a space
    /// when they are visibly apart.  The result is trimmed.
    pub fn textbox(&self, clip: &Rect) -> String {
        let mut lines: Vec<String> = Vec::new();

        for line in self.blocks.iter().flat_map(|b| b.lines.iter()) {
            let mut text = String::new();
            let mut prev_x1: Option<f32> = None;

            for span in &line.spans {
                let mut span_text = String::new();
                let mut first_x0: Option<f32> = None;
                let mut last_x1 = 0.0;

                for ch in span.chars.iter().filter(|c| clip.contains_point(c.bbox.center())) {
                    first_x0.get_or_insert(ch.bbox.x0);
                    last_x1 = ch.bbox.x1;
                    span_text.push_str(&ch.text);
                }

                let Some(x0) = first_x0 else {
                    continue;
                };

                if let Some(prev) = prev_x1 {
                    if x0 - prev > MIN_WORD_GAP && needs_space_between(&text, &span_text) {
                        text.push(' ');
                    }
                }
                text.push_str(&span_text);
                prev_x1 = Some(last_x1);
            }

            if !text.is_empty() {
                lines.push(text);
            }
        }

        lines.join("\n").trim().to_string()
    }
}
