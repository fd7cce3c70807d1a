use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in page space (points, origin at the top-left of the page box,
/// y growing downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in page space.
///
/// `x0 <= x1` (left, right) and `y0 <= y1` (top, bottom) once normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest rectangle containing every point, or `None` for no points.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// True when the rectangle encloses no area.
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Point containment with inclusive edges.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    /// True when `other` lies entirely inside `self` (edges may touch).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    /// True when the two rectangles share a non-empty intersection.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x0 < other.x1
            && other.x0 < self.x1
            && self.y0 < other.y1
            && other.y0 < self.y1
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Copy of this rectangle with its right edge moved to `x1`.
    pub fn with_x1(&self, x1: f32) -> Rect {
        Rect { x1, ..*self }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2}, {:.2}, {:.2}, {:.2}]",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

/// A 2x3 affine matrix `[a, b, c, d, e, f]` using PDF's row-vector convention:
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// `self` applied first, then `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn transform(&self, x: f32, y: f32) -> Point {
        let [a, b, c, d, e, f] = self.0;
        Point::new(a * x + c * y + e, b * x + d * y + f)
    }

    /// Vertical expansion factor, used to turn a font size into a rendered size.
    pub fn vertical_scale(&self) -> f32 {
        (self.0[2].powi(2) + self.0[3].powi(2)).sqrt()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

/// Normalized RGB colour, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const YELLOW: Rgb = Rgb {
        r: 1.0,
        g: 1.0,
        b: 0.0,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    /// Naive CMYK to RGB conversion.
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::new(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }
}

// ---------------------------------------------------------------------------
// Drawings
// ---------------------------------------------------------------------------

/// How a path was painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawingKind {
    /// `f`, `F`, `f*`
    Fill,
    /// `S`, `s`
    Stroke,
    /// `B`, `B*`, `b`, `b*`
    FillStroke,
}

/// A painted path reduced to its bounding box and fill colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub kind: DrawingKind,
    pub rect: Rect,
    /// Fill colour when the path was filled in a device colour space.
    pub fill: Option<Rgb>,
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// One decoded character code and the box it occupies on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChar {
    /// Usually a single character; ToUnicode mappings may expand to several.
    pub text: String,
    pub bbox: Rect,
}

/// A run of text shown by a single text operator, in one font.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    pub bbox: Rect,
    /// Pen position at the start of the run, on the baseline.
    pub origin: Point,
    /// Rendered size in points (font size scaled by text and current matrices).
    pub font_size: f32,
    pub font_name: String,
    pub is_bold: bool,
    pub is_italic: bool,
    pub chars: Vec<TextChar>,
}

/// Spans sharing a baseline, ordered left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    pub bbox: Rect,
    pub baseline: f32,
    pub font_size: f32,
}

impl TextLine {
    /// Concatenate all span texts with a single space separator.
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Vertically adjacent lines.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub bbox: Rect,
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// A sticky-note (`/Subtype /Text`) annotation to be written onto a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    pub contents: String,
    pub title: String,
    /// Icon name, e.g. `Note` or `Comment`.
    pub icon: String,
    pub color: Rgb,
}

impl TextAnnotation {
    pub fn note(contents: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            title: title.into(),
            icon: "Note".to_string(),
            color: Rgb::YELLOW,
        }
    }
}
