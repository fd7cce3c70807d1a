//! Content-stream interpretation.
//!
//! Walks a page's decoded operators with a small graphics-state machine and
//! produces the two things callers need from a page: painted paths (reduced
//! to bounding boxes and fill colours) and positioned text runs with
//! per-character boxes.  All output coordinates are in top-left page space.
//!
//! ```text
//! content ops  ->  graphics state  ->  Drawing[] + TextSpan[]
//! ```

use std::rc::Rc;

use unicode_normalization::UnicodeNormalization;

use super::backend::{
    decode_code, get_number_from_value, BackendFontInfo, ContentOp, ObjectId, PageId, PdfBackend,
    PdfValue, Resources,
};
use crate::types::{Drawing, DrawingKind, Matrix, Point, Rect, Rgb, TextChar, TextSpan};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Approximate character width as a fraction of font size when the font
/// carries no usable width for a code.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Glyph box extent above the baseline, as a fraction of font size.
const ASCENT: f32 = 0.8;

/// Glyph box extent below the baseline, as a fraction of font size.
const DESCENT: f32 = -0.2;

/// Fraction of an average glyph width a `TJ` adjustment must exceed before it
/// is read as a word gap.
const KERNING_GAP_RATIO: f32 = 0.3;

/// Deepest chain of Form XObjects drawn from one page.
const MAX_FORM_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything extracted from a single page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Page box in top-left page space (origin at 0,0).
    pub rect: Rect,
    pub drawings: Vec<Drawing>,
    pub spans: Vec<TextSpan>,
    /// Page `/Rotate` in degrees; geometry above is unrotated.
    pub rotation: u16,
}

// ---------------------------------------------------------------------------
// Internal: state machine
// ---------------------------------------------------------------------------

/// Text state parameters plus the text and line matrices.
#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
    is_bold: bool,
    is_italic: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 0.0,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
            is_bold: false,
            is_italic: false,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        let m = &mut self.text_matrix.0;
        m[4] += dx * m[0];
        m[5] += dx * m[1];
    }

    /// Multiply the text line matrix by a translation (used by Td / TD).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let lm = self.line_matrix.0;
        self.line_matrix.0[4] = lm[0] * tx + lm[2] * ty + lm[4];
        self.line_matrix.0[5] = lm[1] * tx + lm[3] * ty + lm[5];
        self.text_matrix = self.line_matrix;
    }

    /// Apply the `Tf` operator: set font and size, detect bold/italic from
    /// the base-font name.
    fn set_font(&mut self, key: Vec<u8>, base_font: &str, size: f32) {
        self.font_key = key;
        self.font_size = size;

        let upper = base_font.to_uppercase();
        self.is_bold = upper.contains("BOLD");
        self.is_italic = upper.contains("ITALIC") || upper.contains("OBLIQUE");
        self.font_name = base_font.to_string();
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    /// `None` while a non-device colour space (pattern, separation) is active.
    fill: Option<Rgb>,
    text: TextState,
}

struct Interpreter<'a> {
    /// Loads Form XObjects; without one, `Do` draws nothing.
    backend: Option<&'a dyn PdfBackend>,
    resources: Rc<Resources>,
    /// Forms currently being drawn, outermost first.
    forms: Vec<ObjectId>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    /// `Q` never pops below this depth (the state saved around a form).
    stack_floor: usize,
    path: Vec<Point>,
    drawings: Vec<Drawing>,
    spans: Vec<TextSpan>,
}

/// Resolve a font resource name to its [`BackendFontInfo`].
fn resolve_font<'a>(key: &[u8], fonts: &'a [BackendFontInfo]) -> Option<&'a BackendFontInfo> {
    fonts.iter().find(|info| info.name == key)
}

fn numbers(operands: &[PdfValue]) -> Vec<f32> {
    operands.iter().filter_map(get_number_from_value).collect()
}

/// Flip matrix mapping PDF user space (bottom-left origin) onto top-left
/// page space for the given `[llx, lly, urx, ury]` box.
pub fn page_flip_matrix(page_box: [f32; 4]) -> Matrix {
    Matrix([1.0, 0.0, 0.0, -1.0, -page_box[0], page_box[3]])
}

impl<'a> Interpreter<'a> {
    fn new(
        backend: Option<&'a dyn PdfBackend>,
        resources: Resources,
        page_box: [f32; 4],
    ) -> Self {
        Self {
            backend,
            resources: Rc::new(resources),
            forms: Vec::new(),
            stack_floor: 0,
            state: GraphicsState {
                ctm: page_flip_matrix(page_box),
                fill: Some(Rgb::gray(0.0)),
                text: TextState::default(),
            },
            stack: Vec::new(),
            path: Vec::new(),
            drawings: Vec::new(),
            spans: Vec::new(),
        }
    }

    fn run(&mut self, ops: &[ContentOp]) -> Result<(), PdfError> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    fn apply(&mut self, op: &ContentOp) -> Result<(), PdfError> {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            // -- Graphics state -----------------------------------------
            "q" => self.stack.push(self.state.clone()),
            "Q" if self.stack.len() > self.stack_floor => {
                if let Some(saved) = self.stack.pop() {
                    // The text matrices are not part of the saved state.
                    let text_matrix = self.state.text.text_matrix;
                    let line_matrix = self.state.text.line_matrix;
                    self.state = saved;
                    self.state.text.text_matrix = text_matrix;
                    self.state.text.line_matrix = line_matrix;
                }
            }
            "cm" => {
                let v = numbers(operands);
                if v.len() == 6 {
                    let m = Matrix([v[0], v[1], v[2], v[3], v[4], v[5]]);
                    self.state.ctm = m.concat(&self.state.ctm);
                }
            }

            // -- XObjects -----------------------------------------------
            "Do" => {
                if let Some(PdfValue::Name(name)) = operands.first() {
                    self.draw_xobject(name)?;
                }
            }

            // -- Fill colour --------------------------------------------
            "g" => {
                if let [level] = numbers(operands)[..] {
                    self.state.fill = Some(Rgb::gray(level));
                }
            }
            "rg" => {
                if let [r, g, b] = numbers(operands)[..] {
                    self.state.fill = Some(Rgb::new(r, g, b));
                }
            }
            "k" => {
                if let [c, m, y, k] = numbers(operands)[..] {
                    self.state.fill = Some(Rgb::from_cmyk(c, m, y, k));
                }
            }
            "cs" => self.handle_cs(operands),
            "sc" | "scn" => self.handle_sc(operands),

            // -- Path construction --------------------------------------
            "m" | "l" => {
                if let [x, y] = numbers(operands)[..] {
                    self.push_point(x, y);
                }
            }
            "c" => {
                if let [x1, y1, x2, y2, x3, y3] = numbers(operands)[..] {
                    self.push_point(x1, y1);
                    self.push_point(x2, y2);
                    self.push_point(x3, y3);
                }
            }
            "v" => {
                if let [x2, y2, x3, y3] = numbers(operands)[..] {
                    self.push_point(x2, y2);
                    self.push_point(x3, y3);
                }
            }
            "y" => {
                if let [x1, y1, x3, y3] = numbers(operands)[..] {
                    self.push_point(x1, y1);
                    self.push_point(x3, y3);
                }
            }
            "re" => {
                if let [x, y, w, h] = numbers(operands)[..] {
                    self.push_point(x, y);
                    self.push_point(x + w, y);
                    self.push_point(x + w, y + h);
                    self.push_point(x, y + h);
                }
            }
            "h" => {}

            // -- Path painting ------------------------------------------
            "f" | "F" | "f*" => self.paint(DrawingKind::Fill),
            "S" | "s" => self.paint(DrawingKind::Stroke),
            "B" | "B*" | "b" | "b*" => self.paint(DrawingKind::FillStroke),
            "n" => self.clear_path(),

            // -- Text object delimiters --------------------------------
            "BT" => {
                self.state.text.text_matrix = Matrix::IDENTITY;
                self.state.text.line_matrix = Matrix::IDENTITY;
            }
            "ET" => {}

            // -- Font ---------------------------------------------------
            "Tf" => self.handle_tf(operands),

            // -- Text matrix / position ---------------------------------
            "Tm" => {
                let v = numbers(operands);
                if v.len() == 6 {
                    let m = Matrix([v[0], v[1], v[2], v[3], v[4], v[5]]);
                    self.state.text.text_matrix = m;
                    self.state.text.line_matrix = m;
                }
            }
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.state.text.translate_line(tx, ty);
                }
            }
            "TD" => {
                // TD is equivalent to: -ty TL ; tx ty Td
                if let [tx, ty] = numbers(operands)[..] {
                    self.state.text.leading = -ty;
                    self.state.text.translate_line(tx, ty);
                }
            }
            "T*" => {
                let leading = self.state.text.leading;
                self.state.text.translate_line(0.0, -leading);
            }
            "TL" => {
                if let Some(v) = operands.first().and_then(get_number_from_value) {
                    self.state.text.leading = v;
                }
            }

            // -- Spacing / scaling --------------------------------------
            "Tc" => {
                if let Some(v) = operands.first().and_then(get_number_from_value) {
                    self.state.text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operands.first().and_then(get_number_from_value) {
                    self.state.text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = operands.first().and_then(get_number_from_value) {
                    self.state.text.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = operands.first().and_then(get_number_from_value) {
                    self.state.text.text_rise = v;
                }
            }

            // -- Show text ----------------------------------------------
            "Tj" => {
                if let Some(first) = operands.first() {
                    self.show(std::slice::from_ref(first));
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = operands.first() {
                    self.show(arr);
                }
            }
            "'" => {
                let leading = self.state.text.leading;
                self.state.text.translate_line(0.0, -leading);
                if let Some(first) = operands.first() {
                    self.show(std::slice::from_ref(first));
                }
            }
            "\"" => {
                // " aw ac string  =>  set Tw, Tc, T*, Tj
                if operands.len() >= 3 {
                    if let Some(aw) = get_number_from_value(&operands[0]) {
                        self.state.text.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(&operands[1]) {
                        self.state.text.char_spacing = ac;
                    }
                    let leading = self.state.text.leading;
                    self.state.text.translate_line(0.0, -leading);
                    self.show(std::slice::from_ref(&operands[2]));
                }
            }

            _ => {}
        }
        Ok(())
    }

    /// Draw the Form XObject named `name` with its matrix and resources,
    /// restoring the graphics state afterwards. Image XObjects are ignored.
    fn draw_xobject(&mut self, name: &[u8]) -> Result<(), PdfError> {
        let Some(backend) = self.backend else {
            return Ok(());
        };
        let Some(&id) = self.resources.xobjects.get(name) else {
            log::debug!(
                "XObject {} not found in resources",
                String::from_utf8_lossy(name)
            );
            return Ok(());
        };
        if self.forms.contains(&id) || self.forms.len() >= MAX_FORM_DEPTH {
            return Err(PdfError::Parse(format!(
                "Form XObject {} is nested too deeply or draws itself",
                String::from_utf8_lossy(name)
            )));
        }
        let Some(form) = backend.form_xobject(id)? else {
            return Ok(());
        };
        let ops = backend.decode_content(&form.content)?;

        let saved_state = self.state.clone();
        let saved_depth = self.stack.len();
        let saved_floor = self.stack_floor;
        let parent_resources = form
            .resources
            .map(|own| std::mem::replace(&mut self.resources, Rc::new(own)));
        self.state.ctm = form.matrix.concat(&self.state.ctm);
        self.stack_floor = saved_depth;
        self.forms.push(id);

        let result = self.run(&ops);

        self.forms.pop();
        if let Some(parent) = parent_resources {
            self.resources = parent;
        }
        self.stack.truncate(saved_depth);
        self.stack_floor = saved_floor;
        self.state = saved_state;
        result
    }

    // -- colour -------------------------------------------------------------

    fn handle_cs(&mut self, operands: &[PdfValue]) {
        let Some(PdfValue::Name(space)) = operands.first() else {
            return;
        };
        // Selecting a colour space resets the colour to its initial value.
        self.state.fill = match space.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Some(Rgb::gray(0.0)),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(Rgb::gray(0.0)),
            b"DeviceCMYK" | b"CMYK" => Some(Rgb::gray(0.0)),
            b"Pattern" => None,
            // Named resource spaces (ICCBased and friends): read by operand
            // count in `sc`/`scn`.
            _ => Some(Rgb::gray(0.0)),
        };
    }

    fn handle_sc(&mut self, operands: &[PdfValue]) {
        if matches!(operands.last(), Some(PdfValue::Name(_))) {
            self.state.fill = None;
            return;
        }
        self.state.fill = match numbers(operands)[..] {
            [level] => Some(Rgb::gray(level)),
            [r, g, b] => Some(Rgb::new(r, g, b)),
            [c, m, y, k] => Some(Rgb::from_cmyk(c, m, y, k)),
            _ => None,
        };
    }

    // -- paths --------------------------------------------------------------

    fn push_point(&mut self, x: f32, y: f32) {
        self.path.push(self.state.ctm.transform(x, y));
    }

    fn clear_path(&mut self) {
        self.path.clear();
    }

    fn paint(&mut self, kind: DrawingKind) {
        if let Some(rect) = Rect::from_points(&self.path) {
            let fill = match kind {
                DrawingKind::Stroke => None,
                DrawingKind::Fill | DrawingKind::FillStroke => self.state.fill,
            };
            self.drawings.push(Drawing { kind, rect, fill });
        }
        self.clear_path();
    }

    // -- text ---------------------------------------------------------------

    fn handle_tf(&mut self, operands: &[PdfValue]) {
        if operands.len() < 2 {
            return;
        }
        let key = match &operands[0] {
            PdfValue::Name(n) => n.clone(),
            PdfValue::Str(s) => s.clone(),
            _ => return,
        };
        let size = get_number_from_value(&operands[1]).unwrap_or(0.0);
        let resources = Rc::clone(&self.resources);
        if let Some(info) = resolve_font(&key, &resources.fonts) {
            let base = info.base_font.as_deref().unwrap_or("");
            self.state.text.set_font(key, base, size);
        } else {
            log::debug!(
                "font {} not found in page resources",
                String::from_utf8_lossy(&key)
            );
            let name = String::from_utf8_lossy(&key).to_string();
            self.state.text.set_font(key, &name, size);
        }
    }

    /// Show a sequence of strings and `TJ` adjustments as one span.
    fn show(&mut self, elements: &[PdfValue]) {
        let resources = Rc::clone(&self.resources);
        let font = resolve_font(&self.state.text.font_key, &resources.fonts);
        let start = self.text_space_point(0.0, self.state.text.text_rise);
        let font_size = self.rendering_matrix().vertical_scale() * self.state.text.font_size;
        let mut chars: Vec<TextChar> = Vec::new();

        for elem in elements {
            match elem {
                PdfValue::Str(bytes) => self.show_string(bytes, font, &mut chars),
                val => {
                    // Numeric kerning: negative value = move right, positive =
                    // move left (in thousandths of a text-space unit).
                    if let Some(adj) = get_number_from_value(val) {
                        let ts = &self.state.text;
                        let dx = -adj / 1000.0 * ts.font_size * ts.horiz_scale;
                        let gap_threshold = ts.font_size
                            * APPROX_CHAR_WIDTH_RATIO
                            * ts.horiz_scale
                            * KERNING_GAP_RATIO;

                        let after_space = chars
                            .last()
                            .map_or(true, |c| c.text.chars().all(char::is_whitespace));
                        if dx > gap_threshold && !after_space {
                            let bbox = self.glyph_box(dx);
                            chars.push(TextChar {
                                text: " ".to_string(),
                                bbox,
                            });
                        }

                        self.state.text.advance_x(dx);
                    }
                }
            }
        }

        let text: String = chars.iter().map(|c| c.text.as_str()).collect();
        if text.trim().is_empty() {
            return;
        }

        let bbox = chars
            .iter()
            .map(|c| c.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(Rect::new(start.x, start.y, start.x, start.y));

        let ts = &self.state.text;
        self.spans.push(TextSpan {
            text,
            bbox,
            origin: start,
            font_size: font_size.abs(),
            font_name: ts.font_name.clone(),
            is_bold: ts.is_bold,
            is_italic: ts.is_italic,
            chars,
        });
    }

    fn show_string(
        &mut self,
        bytes: &[u8],
        font: Option<&BackendFontInfo>,
        chars: &mut Vec<TextChar>,
    ) {
        let code_len = font.map(BackendFontInfo::code_length).unwrap_or(1);

        for chunk in bytes.chunks(code_len) {
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            let ts = &self.state.text;
            let w0 = font
                .and_then(|f| f.glyph_width(code))
                .filter(|w| *w > 0.0)
                .map(|w| w / 1000.0)
                .unwrap_or(APPROX_CHAR_WIDTH_RATIO);

            let glyph_width = w0 * ts.font_size * ts.horiz_scale;
            let mut advance = w0 * ts.font_size + ts.char_spacing;
            if code_len == 1 && code == 32 {
                advance += ts.word_spacing;
            }
            advance *= ts.horiz_scale;

            let text: String = decode_code(font, code)
                .nfkc()
                .filter(|c| *c != '\u{FFFD}')
                .collect();
            if !text.is_empty() {
                let bbox = self.glyph_box(glyph_width);
                chars.push(TextChar { text, bbox });
            }

            self.state.text.advance_x(advance);
        }
    }

    /// Text matrix combined with the current transformation matrix.
    fn rendering_matrix(&self) -> Matrix {
        self.state.text.text_matrix.concat(&self.state.ctm)
    }

    fn text_space_point(&self, x: f32, y: f32) -> Point {
        self.rendering_matrix().transform(x, y)
    }

    /// Page-space box of a glyph `width` text-space units wide at the
    /// current pen position.
    fn glyph_box(&self, width: f32) -> Rect {
        let ts = &self.state.text;
        let bottom = ts.text_rise + DESCENT * ts.font_size;
        let top = ts.text_rise + ASCENT * ts.font_size;
        let m = self.rendering_matrix();
        let corners = [
            m.transform(0.0, bottom),
            m.transform(width, bottom),
            m.transform(width, top),
            m.transform(0.0, top),
        ];
        Rect::from_points(&corners).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn into_page_content(interpreter: Interpreter<'_>, page_box: [f32; 4], rotation: u16) -> PageContent {
    PageContent {
        rect: Rect::new(
            0.0,
            0.0,
            page_box[2] - page_box[0],
            page_box[3] - page_box[1],
        ),
        drawings: interpreter.drawings,
        spans: interpreter.spans,
        rotation,
    }
}

/// Interpret pre-decoded operators for a page with the given fonts and
/// `[llx, lly, urx, ury]` page box. XObjects are not followed.
pub fn interpret(
    ops: &[ContentOp],
    fonts: &[BackendFontInfo],
    page_box: [f32; 4],
) -> Result<PageContent, PdfError> {
    let resources = Resources {
        fonts: fonts.to_vec(),
        ..Default::default()
    };
    let mut interpreter = Interpreter::new(None, resources, page_box);
    interpreter.run(ops)?;
    Ok(into_page_content(interpreter, page_box, 0))
}

/// Walk a single page's content stream, and the Form XObjects it draws, and
/// collect its drawings and text.
pub fn extract_page(backend: &dyn PdfBackend, page_id: PageId) -> Result<PageContent, PdfError> {
    let page_box = backend.page_box(page_id)?;
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let resources = Resources {
        fonts: backend.page_fonts(page_id)?,
        xobjects: backend.page_xobjects(page_id)?,
    };
    let rotation = backend.page_rotation(page_id)?;

    let mut interpreter = Interpreter::new(Some(backend), resources, page_box);
    interpreter.run(&ops)?;
    Ok(into_page_content(interpreter, page_box, rotation))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::parser::cmap::CMap;

    const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

    /// A mock backend that returns pre-decoded operations.
    struct MockBackend {
        fonts: Vec<BackendFontInfo>,
        ops: Vec<ContentOp>,
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (1, 0))])
        }

        fn page_box(&self, _page: PageId) -> Result<[f32; 4], PdfError> {
            Ok(LETTER)
        }

        fn page_fonts(&self, _page_id: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
            Ok(self.fonts.clone())
        }

        fn page_content(&self, _page_id: PageId) -> Result<Vec<u8>, PdfError> {
            Ok(vec![])
        }

        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
            Ok(self.ops.clone())
        }
    }

    /// Resources whose font dictionary cannot be read.
    struct BrokenFontsBackend;

    impl PdfBackend for BrokenFontsBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (1, 0))])
        }

        fn page_box(&self, _page: PageId) -> Result<[f32; 4], PdfError> {
            Ok(LETTER)
        }

        fn page_fonts(&self, _page_id: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
            Err(PdfError::Parse("font F1 is not a dictionary".into()))
        }

        fn page_content(&self, _page_id: PageId) -> Result<Vec<u8>, PdfError> {
            Ok(vec![])
        }

        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
            Ok(vec![])
        }
    }

    fn make_op(operator: &str, operands: Vec<f32>) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands: operands.into_iter().map(PdfValue::Real).collect(),
        }
    }

    fn helvetica_font() -> Vec<BackendFontInfo> {
        vec![BackendFontInfo {
            name: b"F1".to_vec(),
            base_font: Some("Helvetica".to_string()),
            ..Default::default()
        }]
    }

    fn tf_op(font: &[u8], size: f32) -> ContentOp {
        ContentOp {
            operator: "Tf".to_string(),
            operands: vec![PdfValue::Name(font.to_vec()), PdfValue::Real(size)],
        }
    }

    fn tm_op(tx: f32, ty: f32) -> ContentOp {
        make_op("Tm", vec![1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn tj_op(text: &[u8]) -> ContentOp {
        ContentOp {
            operator: "Tj".to_string(),
            operands: vec![PdfValue::Str(text.to_vec())],
        }
    }

    fn tj_array_op(elements: Vec<PdfValue>) -> ContentOp {
        ContentOp {
            operator: "TJ".to_string(),
            operands: vec![PdfValue::Array(elements)],
        }
    }

    fn name_op(operator: &str, name: &[u8]) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands: vec![PdfValue::Name(name.to_vec())],
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    fn run(fonts: Vec<BackendFontInfo>, ops: Vec<ContentOp>) -> PageContent {
        let backend = MockBackend { fonts, ops };
        extract_page(&backend, (1, 0)).unwrap()
    }

    // -- text ---------------------------------------------------------------

    #[test]
    fn test_extract_simple_tj_in_page_space() {
        let page = run(
            helvetica_font(),
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 12.0),
                tm_op(72.0, 700.0),
                tj_op(b"Hello"),
                make_op("ET", vec![]),
            ],
        );

        assert_eq!(page.rect, Rect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(page.spans.len(), 1);
        let span = &page.spans[0];
        assert_eq!(span.text, "Hello");
        assert_eq!(span.chars.len(), 5);
        assert!(approx(span.origin.x, 72.0));
        assert!(approx(span.origin.y, 92.0));
        assert!(approx(span.font_size, 12.0));
        // Five glyphs at the 0.5 fallback ratio: 6pt each.
        assert!(approx(span.bbox.x0, 72.0));
        assert!(approx(span.bbox.x1, 102.0));
        assert!(approx(span.bbox.y0, 92.0 - 9.6));
        assert!(approx(span.bbox.y1, 92.0 + 2.4));
        assert!(approx(span.chars[1].bbox.x0, 78.0));
    }

    #[test]
    fn test_font_widths_drive_glyph_boxes() {
        let fonts = vec![BackendFontInfo {
            name: b"F1".to_vec(),
            base_font: Some("Courier-Bold".to_string()),
            widths: HashMap::from([(u32::from(b'i'), 250.0), (u32::from(b'W'), 1000.0)]),
            ..Default::default()
        }];
        let page = run(
            fonts,
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 10.0),
                tm_op(100.0, 500.0),
                tj_op(b"Wi"),
            ],
        );

        let span = &page.spans[0];
        assert!(span.is_bold);
        assert!(approx(span.chars[0].bbox.width(), 10.0));
        assert!(approx(span.chars[1].bbox.x0, 110.0));
        assert!(approx(span.chars[1].bbox.width(), 2.5));
    }

    #[test]
    fn test_tj_array_large_kerning_inserts_space() {
        let page = run(
            helvetica_font(),
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 12.0),
                tm_op(72.0, 700.0),
                tj_array_op(vec![
                    PdfValue::Str(b"Hello".to_vec()),
                    PdfValue::Integer(-500),
                    PdfValue::Str(b"World".to_vec()),
                ]),
            ],
        );

        assert_eq!(page.spans.len(), 1);
        assert_eq!(page.spans[0].text, "Hello World");
        let world_start = page.spans[0].chars[6].bbox.x0;
        assert!(approx(world_start, 72.0 + 30.0 + 6.0));
    }

    #[test]
    fn test_tj_array_small_kerning_no_space() {
        let page = run(
            helvetica_font(),
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 12.0),
                tm_op(72.0, 700.0),
                tj_array_op(vec![
                    PdfValue::Str(b"Wo".to_vec()),
                    PdfValue::Integer(80),
                    PdfValue::Str(b"rd".to_vec()),
                ]),
            ],
        );

        assert_eq!(page.spans[0].text, "Word");
    }

    #[test]
    fn test_td_and_tstar_move_lines_down() {
        let page = run(
            helvetica_font(),
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 10.0),
                make_op("TL", vec![14.0]),
                make_op("Td", vec![72.0, 700.0]),
                tj_op(b"one"),
                make_op("T*", vec![]),
                tj_op(b"two"),
            ],
        );

        assert_eq!(page.spans.len(), 2);
        assert!(approx(page.spans[0].origin.y, 92.0));
        assert!(approx(page.spans[1].origin.y, 106.0));
        assert!(approx(page.spans[1].origin.x, 72.0));
    }

    #[test]
    fn test_cm_scales_font_size() {
        let page = run(
            helvetica_font(),
            vec![
                make_op("cm", vec![2.0, 0.0, 0.0, 2.0, 0.0, 0.0]),
                make_op("BT", vec![]),
                tf_op(b"F1", 6.0),
                tm_op(50.0, 300.0),
                tj_op(b"x"),
            ],
        );

        let span = &page.spans[0];
        assert!(approx(span.font_size, 12.0));
        assert!(approx(span.origin.x, 100.0));
        assert!(approx(span.origin.y, 792.0 - 600.0));
    }

    #[test]
    fn test_composite_font_uses_two_byte_codes_and_to_unicode() {
        let mut map = CMap::new();
        map.insert(0x0011, "A".to_string());
        map.insert(0x0012, "\u{FB01}".to_string());
        let fonts = vec![BackendFontInfo {
            name: b"F2".to_vec(),
            base_font: Some("ABCDEF+NotoMono".to_string()),
            subtype: Some("Type0".to_string()),
            encoding: Some("Identity-H".to_string()),
            default_width: Some(600.0),
            to_unicode: Some(map),
            ..Default::default()
        }];
        let page = run(
            fonts,
            vec![
                make_op("BT", vec![]),
                tf_op(b"F2", 10.0),
                tm_op(10.0, 10.0),
                tj_op(&[0x00, 0x11, 0x00, 0x12]),
            ],
        );

        let span = &page.spans[0];
        // The ligature is compatibility-normalized.
        assert_eq!(span.text, "Afi");
        assert_eq!(span.chars.len(), 2);
        assert!(approx(span.chars[1].bbox.x0, 16.0));
    }

    #[test]
    fn test_replacement_characters_dropped() {
        let mut map = CMap::new();
        map.insert(0x01, "\u{FFFD}".to_string());
        map.insert(0x02, "b".to_string());
        let fonts = vec![BackendFontInfo {
            name: b"F1".to_vec(),
            to_unicode: Some(map),
            ..Default::default()
        }];
        let page = run(
            fonts,
            vec![
                make_op("BT", vec![]),
                tf_op(b"F1", 10.0),
                tj_op(&[0x01, 0x02]),
            ],
        );

        assert_eq!(page.spans[0].text, "b");
        assert_eq!(page.spans[0].chars.len(), 1);
    }

    #[test]
    fn test_whitespace_only_span_skipped() {
        let page = run(
            helvetica_font(),
            vec![make_op("BT", vec![]), tf_op(b"F1", 10.0), tj_op(b"   ")],
        );
        assert!(page.spans.is_empty());
    }

    // -- drawings -----------------------------------------------------------

    #[test]
    fn test_filled_rectangle_with_rgb() {
        let page = run(
            vec![],
            vec![
                make_op("rg", vec![1.0, 1.0, 0.0]),
                make_op("re", vec![100.0, 200.0, 50.0, 20.0]),
                make_op("f", vec![]),
            ],
        );

        assert_eq!(page.drawings.len(), 1);
        let d = &page.drawings[0];
        assert_eq!(d.kind, DrawingKind::Fill);
        assert_eq!(d.rect, Rect::new(100.0, 572.0, 150.0, 592.0));
        assert_eq!(d.fill, Some(Rgb::YELLOW));
    }

    #[test]
    fn test_stroke_has_no_fill() {
        let page = run(
            vec![],
            vec![
                make_op("rg", vec![1.0, 1.0, 0.0]),
                make_op("m", vec![0.0, 0.0]),
                make_op("l", vec![10.0, 10.0]),
                make_op("S", vec![]),
            ],
        );
        assert_eq!(page.drawings[0].kind, DrawingKind::Stroke);
        assert_eq!(page.drawings[0].fill, None);
    }

    #[test]
    fn test_end_path_discards() {
        let page = run(
            vec![],
            vec![
                make_op("re", vec![0.0, 0.0, 10.0, 10.0]),
                make_op("W", vec![]),
                make_op("n", vec![]),
                make_op("re", vec![20.0, 20.0, 10.0, 10.0]),
                make_op("f", vec![]),
            ],
        );
        assert_eq!(page.drawings.len(), 1);
        assert_eq!(page.drawings[0].rect.x0, 20.0);
    }

    #[test]
    fn test_save_restore_colour_and_ctm() {
        let page = run(
            vec![],
            vec![
                make_op("g", vec![0.5]),
                make_op("q", vec![]),
                make_op("cm", vec![1.0, 0.0, 0.0, 1.0, 100.0, 0.0]),
                make_op("k", vec![0.0, 0.0, 1.0, 0.0]),
                make_op("re", vec![0.0, 0.0, 10.0, 10.0]),
                make_op("f", vec![]),
                make_op("Q", vec![]),
                make_op("re", vec![0.0, 0.0, 10.0, 10.0]),
                make_op("f", vec![]),
            ],
        );

        assert_eq!(page.drawings.len(), 2);
        assert_eq!(page.drawings[0].fill, Some(Rgb::YELLOW));
        assert_eq!(page.drawings[0].rect.x0, 100.0);
        assert_eq!(page.drawings[1].fill, Some(Rgb::gray(0.5)));
        assert_eq!(page.drawings[1].rect.x0, 0.0);
    }

    #[test]
    fn test_scn_by_operand_count() {
        let page = run(
            vec![],
            vec![
                name_op("cs", b"CS0"),
                make_op("scn", vec![1.0, 1.0, 0.0]),
                make_op("re", vec![0.0, 0.0, 10.0, 10.0]),
                make_op("f", vec![]),
            ],
        );
        assert_eq!(page.drawings[0].fill, Some(Rgb::YELLOW));
    }

    #[test]
    fn test_pattern_fill_has_no_colour() {
        let page = run(
            vec![],
            vec![
                name_op("cs", b"Pattern"),
                name_op("scn", b"P0"),
                make_op("re", vec![0.0, 0.0, 10.0, 10.0]),
                make_op("f", vec![]),
            ],
        );
        assert_eq!(page.drawings[0].fill, None);
    }

    #[test]
    fn test_unreadable_fonts_fail_the_page() {
        assert!(matches!(
            extract_page(&BrokenFontsBackend, (1, 0)),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_do_without_backend_draws_nothing() {
        let ops = vec![name_op("Do", b"X1")];
        let page = interpret(&ops, &[], LETTER).unwrap();
        assert!(page.drawings.is_empty());
        assert!(page.spans.is_empty());
    }

    #[test]
    fn test_crop_box_offset_is_removed() {
        let ops = vec![
            make_op("re", vec![50.0, 50.0, 10.0, 10.0]),
            make_op("f", vec![]),
        ];
        let page = interpret(&ops, &[], [50.0, 50.0, 250.0, 350.0]).unwrap();
        assert_eq!(page.rect, Rect::new(0.0, 0.0, 200.0, 300.0));
        assert_eq!(page.drawings[0].rect, Rect::new(0.0, 290.0, 10.0, 300.0));
    }
}
