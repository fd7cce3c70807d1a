use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use lopdf::{self, content::Content};

use super::cmap::{parse_to_unicode, CMap};
use super::syntax::check_content_syntax;
use crate::types::Matrix;
use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// Mirrors `lopdf::ObjectId`: (object number, generation number).
pub type ObjectId = (u32, u16);

/// A page identifier.
pub type PageId = ObjectId;

/// Bound on page-tree and Form XObject nesting.
const MAX_NESTING: usize = 32;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone, Default)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name from the font dictionary, if present.
    pub base_font: Option<String>,
    /// Font subtype (e.g. `Type1`, `TrueType`, `Type0`).
    pub subtype: Option<String>,
    /// Encoding entry from the font dictionary, if present.
    pub encoding: Option<String>,
    /// Glyph advance widths in thousandths of text space, keyed by character code.
    pub widths: HashMap<u32, f32>,
    /// Width used for codes missing from `widths` (`MissingWidth` or `DW`).
    pub default_width: Option<f32>,
    /// Parsed `/ToUnicode` mapping, if the font carries one.
    pub to_unicode: Option<CMap>,
}

impl BackendFontInfo {
    /// Composite (`Type0`) fonts address glyphs with two-byte codes.
    pub fn is_composite(&self) -> bool {
        self.subtype.as_deref() == Some("Type0")
    }

    /// Number of bytes per character code in strings shown with this font.
    pub fn code_length(&self) -> usize {
        if self.is_composite() {
            2
        } else {
            1
        }
    }

    /// Advance width for `code` in thousandths of text space, if known.
    pub fn glyph_width(&self, code: u32) -> Option<f32> {
        self.widths.get(&code).copied().or(self.default_width)
    }
}

/// Fonts and XObjects a content stream can refer to by name.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    pub fonts: Vec<BackendFontInfo>,
    /// XObject resource names mapped to their object ids.
    pub xobjects: HashMap<Vec<u8>, ObjectId>,
}

/// A Form XObject ready for interpretation.
#[derive(Debug, Clone)]
pub struct FormXObject {
    /// Form space to user space (`/Matrix`, identity when absent).
    pub matrix: Matrix,
    /// Decompressed content stream.
    pub content: Vec<u8>,
    /// The form's own `/Resources`; `None` inherits those of the invoking stream.
    pub resources: Option<Resources>,
}

/// A simplified, lopdf-independent representation of a PDF value.
///
/// This enum decouples higher-level logic from the concrete `lopdf::Object`
/// type so that the content interpreter can work with pure data.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// References are preserved as `PdfValue::Reference`.  Stream dictionaries
/// are converted but the raw stream bytes are discarded (they must be
/// obtained through [`PdfBackend::page_content`]).
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => {
            let entries = dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Stream(stream) => {
            let entries = stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// Handles three cases in order:
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix) -- strips BOM and decodes.
/// 2. Valid UTF-8 -- returned as-is.
/// 3. Fallback to Latin-1 (ISO 8859-1) -- each byte mapped to its Unicode
///    code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let payload = &bytes[2..];
        let code_units: Vec<u16> = payload
            .chunks(2)
            .filter_map(|chunk| {
                if chunk.len() == 2 {
                    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    // Try UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Fallback: Latin-1 (PDFDocEncoding for the printable range).
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a Rust string as a PDF text string.
///
/// Pure ASCII is written as-is; anything else becomes UTF-16BE with a BOM so
/// that viewers render it correctly.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Decode a single character code shown with `font`.
///
/// Lookup order: the font's ToUnicode map, then (for `Identity` composite
/// fonts) the code itself as a UTF-16 unit, then Latin-1 for one-byte codes.
pub fn decode_code(font: Option<&BackendFontInfo>, code: u32) -> String {
    if let Some(font) = font {
        if let Some(mapped) = font.to_unicode.as_ref().and_then(|m| m.get(&code)) {
            return mapped.clone();
        }
        if font.is_composite() {
            return char::from_u32(code)
                .filter(|c| *c != '\0')
                .map(String::from)
                .unwrap_or_default();
        }
    }

    if code <= 0xFF {
        (code as u8 as char).to_string()
    } else {
        char::from_u32(code).map(String::from).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// This trait exists so that the content interpreter can be tested against
/// mock implementations without building real PDF files.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the visible page box as `[llx, lly, urx, ury]` in user space.
    fn page_box(&self, page: PageId) -> Result<[f32; 4], PdfError>;

    /// Return font information for every font referenced by the given page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError>;

    /// Named XObjects in the page's (possibly inherited) resources.
    fn page_xobjects(&self, _page: PageId) -> Result<HashMap<Vec<u8>, ObjectId>, PdfError> {
        Ok(HashMap::new())
    }

    /// Load the XObject `id`, or `None` when it is not a Form (images,
    /// PostScript).
    fn form_xobject(&self, _id: ObjectId) -> Result<Option<FormXObject>, PdfError> {
        Ok(None)
    }

    /// Page `/Rotate` in degrees, normalised to `0..360`.
    fn page_rotation(&self, _page: PageId) -> Result<u16, PdfError> {
        Ok(0)
    }

    /// Return the raw (possibly compressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Parse a PDF file from disk.
    pub fn load_path(path: &Path) -> Result<Self, PdfError> {
        let data = std::fs::read(path)?;
        Self::load_bytes(&data)
    }

    fn from_document(doc: lopdf::Document) -> Result<Self, PdfError> {
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &lopdf::Document {
        &self.doc
    }

    /// Mutable access for writers (annotations).
    pub fn raw_doc_mut(&mut self) -> &mut lopdf::Document {
        &mut self.doc
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    // -- private helpers ----------------------------------------------------

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Follow a single level of indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// Look `key` up on `dict`, then on its page-tree ancestors.
    fn find_inherited<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        let mut current = dict;
        for _ in 0..MAX_NESTING {
            if let Ok(obj) = current.get(key) {
                return Some(self.resolve(obj));
            }
            let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
            current = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        }
        None
    }

    fn page_resources(&self, page: PageId) -> Result<Option<&lopdf::Dictionary>, PdfError> {
        let dict = self.page_dict(page)?;
        match self.find_inherited(dict, b"Resources") {
            None | Some(lopdf::Object::Null) => Ok(None),
            Some(obj) => obj
                .as_dict()
                .map(Some)
                .map_err(|e| PdfError::Parse(format!("page resources are not a dictionary: {}", e))),
        }
    }

    fn fonts_in(&self, resources: &lopdf::Dictionary) -> Result<Vec<BackendFontInfo>, PdfError> {
        let Ok(fonts) = resources.get(b"Font") else {
            return Ok(Vec::new());
        };
        let fonts = self
            .resolve(fonts)
            .as_dict()
            .map_err(|e| PdfError::Parse(format!("font resources are not a dictionary: {}", e)))?;

        fonts
            .iter()
            .map(|(name, obj)| -> Result<BackendFontInfo, PdfError> {
                let dict = self.resolve(obj).as_dict().map_err(|e| {
                    PdfError::Parse(format!(
                        "font {} is not a dictionary: {}",
                        String::from_utf8_lossy(name),
                        e
                    ))
                })?;
                Ok(self.font_info(name, dict))
            })
            .collect()
    }

    fn xobjects_in(&self, resources: &lopdf::Dictionary) -> HashMap<Vec<u8>, ObjectId> {
        let Some(xobjects) = self.dict_dict(resources, b"XObject") else {
            return HashMap::new();
        };
        xobjects
            .iter()
            .filter_map(|(name, obj)| obj.as_reference().ok().map(|id| (name.clone(), id)))
            .collect()
    }

    fn resources_in(&self, resources: &lopdf::Dictionary) -> Result<Resources, PdfError> {
        Ok(Resources {
            fonts: self.fonts_in(resources)?,
            xobjects: self.xobjects_in(resources),
        })
    }

    /// Walk up the page tree to find an inheritable box array (`MediaBox`,
    /// `CropBox`).
    fn find_inherited_box(&self, dict: &lopdf::Dictionary, key: &[u8]) -> Option<Vec<f32>> {
        if let Ok(obj) = dict.get(key) {
            if let lopdf::Object::Array(arr) = self.resolve(obj) {
                if let Ok(nums) = self.array_to_f32s(arr) {
                    if nums.len() >= 4 {
                        return Some(nums);
                    }
                }
            }
        }

        // Recurse into Parent.
        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent_dict = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.find_inherited_box(parent_dict, key)
    }

    /// Convert a slice of lopdf objects to `f32` values.
    fn array_to_f32s(&self, objects: &[lopdf::Object]) -> Result<Vec<f32>, PdfError> {
        objects
            .iter()
            .map(|obj| match self.resolve(obj) {
                lopdf::Object::Integer(i) => Ok(*i as f32),
                lopdf::Object::Real(f) => Ok(*f),
                other => Err(PdfError::Parse(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }

    fn number(&self, obj: &lopdf::Object) -> Option<f32> {
        match self.resolve(obj) {
            lopdf::Object::Integer(i) => Some(*i as f32),
            lopdf::Object::Real(f) => Some(*f),
            _ => None,
        }
    }

    fn dict_number(&self, dict: &lopdf::Dictionary, key: &[u8]) -> Option<f32> {
        dict.get(key).ok().and_then(|o| self.number(o))
    }

    fn dict_array<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a Vec<lopdf::Object>> {
        match self.resolve(dict.get(key).ok()?) {
            lopdf::Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    fn dict_dict<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Dictionary> {
        self.resolve(dict.get(key).ok()?).as_dict().ok()
    }

    /// Widths of a simple font: `FirstChar` + `Widths`, with the descriptor's
    /// `MissingWidth` as default.
    fn simple_font_widths(&self, font: &lopdf::Dictionary) -> (HashMap<u32, f32>, Option<f32>) {
        let mut widths = HashMap::new();
        let first_char = self.dict_number(font, b"FirstChar").unwrap_or(0.0) as u32;
        if let Some(arr) = self.dict_array(font, b"Widths") {
            for (i, obj) in arr.iter().enumerate() {
                if let Some(w) = self.number(obj) {
                    widths.insert(first_char + i as u32, w);
                }
            }
        }

        let missing = self
            .dict_dict(font, b"FontDescriptor")
            .and_then(|d| self.dict_number(d, b"MissingWidth"))
            .filter(|w| *w > 0.0);

        (widths, missing)
    }

    /// Widths of a composite font from its descendant's `W` array and `DW`.
    ///
    /// `W` mixes two forms: `c [w1 w2 ...]` and `c_first c_last w`.
    fn composite_font_widths(&self, font: &lopdf::Dictionary) -> (HashMap<u32, f32>, Option<f32>) {
        let mut widths = HashMap::new();
        let descendant = self
            .dict_array(font, b"DescendantFonts")
            .and_then(|arr| arr.first())
            .and_then(|obj| self.resolve(obj).as_dict().ok());

        let Some(descendant) = descendant else {
            return (widths, Some(1000.0));
        };

        let default = self.dict_number(descendant, b"DW").unwrap_or(1000.0);

        if let Some(w) = self.dict_array(descendant, b"W") {
            let mut i = 0;
            while i < w.len() {
                let Some(start) = self.number(&w[i]) else {
                    break;
                };
                let start = start as u32;
                match w.get(i + 1).map(|o| self.resolve(o)) {
                    Some(lopdf::Object::Array(list)) => {
                        for (offset, obj) in list.iter().enumerate() {
                            if let Some(width) = self.number(obj) {
                                widths.insert(start + offset as u32, width);
                            }
                        }
                        i += 2;
                    }
                    Some(end_obj) => {
                        let end = self.number(end_obj).unwrap_or(start as f32) as u32;
                        let width = w.get(i + 2).and_then(|o| self.number(o));
                        if let Some(width) = width {
                            for code in start..=end.min(start.saturating_add(0xFFFF)) {
                                widths.insert(code, width);
                            }
                        }
                        i += 3;
                    }
                    None => break,
                }
            }
        }

        (widths, Some(default))
    }

    fn to_unicode_map(&self, font: &lopdf::Dictionary) -> Option<CMap> {
        let obj = self.resolve(font.get(b"ToUnicode").ok()?);
        let stream = obj.as_stream().ok()?;
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let map = parse_to_unicode(&data);
        (!map.is_empty()).then_some(map)
    }

    fn font_info(&self, name: &[u8], dict: &lopdf::Dictionary) -> BackendFontInfo {
        let name_entry = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
        };

        let base_font = name_entry(b"BaseFont");
        let subtype = name_entry(b"Subtype");
        let encoding = name_entry(b"Encoding");

        let (widths, default_width) = if subtype.as_deref() == Some("Type0") {
            self.composite_font_widths(dict)
        } else {
            self.simple_font_widths(dict)
        };

        BackendFontInfo {
            name: name.to_vec(),
            base_font,
            subtype,
            encoding,
            widths,
            default_width,
            to_unicode: self.to_unicode_map(dict),
        }
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_box(&self, page: PageId) -> Result<[f32; 4], PdfError> {
        let dict = self.page_dict(page)?;
        let nums = self
            .find_inherited_box(dict, b"CropBox")
            .or_else(|| self.find_inherited_box(dict, b"MediaBox"))
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;

        // Normalize so that llx <= urx and lly <= ury.
        Ok([
            nums[0].min(nums[2]),
            nums[1].min(nums[3]),
            nums[0].max(nums[2]),
            nums[1].max(nums[3]),
        ])
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
        match self.page_resources(page)? {
            Some(resources) => self.fonts_in(resources),
            None => Ok(Vec::new()),
        }
    }

    fn page_xobjects(&self, page: PageId) -> Result<HashMap<Vec<u8>, ObjectId>, PdfError> {
        Ok(self
            .page_resources(page)?
            .map(|resources| self.xobjects_in(resources))
            .unwrap_or_default())
    }

    fn form_xobject(&self, id: ObjectId) -> Result<Option<FormXObject>, PdfError> {
        let stream = match self.doc.get_object(id) {
            Ok(lopdf::Object::Stream(stream)) => stream,
            Ok(_) => return Err(PdfError::Parse(format!("XObject {:?} is not a stream", id))),
            Err(e) => return Err(PdfError::Parse(format!("cannot get XObject {:?}: {}", id, e))),
        };

        let subtype = stream.dict.get(b"Subtype").and_then(lopdf::Object::as_name);
        if subtype.ok() != Some(b"Form".as_slice()) {
            return Ok(None);
        }

        let matrix = match self.dict_array(&stream.dict, b"Matrix") {
            Some(arr) => match self.array_to_f32s(arr)?[..] {
                [a, b, c, d, e, f] => Matrix([a, b, c, d, e, f]),
                _ => return Err(PdfError::Parse(format!("XObject {:?}: bad /Matrix", id))),
            },
            None => Matrix::IDENTITY,
        };

        let content = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|e| PdfError::Parse(format!("cannot decompress XObject {:?}: {}", id, e)))?
        } else {
            stream.content.clone()
        };

        let resources = match stream.dict.get(b"Resources") {
            Ok(obj) => {
                let dict = self.resolve(obj).as_dict().map_err(|e| {
                    PdfError::Parse(format!("XObject {:?} resources: {}", id, e))
                })?;
                Some(self.resources_in(dict)?)
            }
            Err(_) => None,
        };

        Ok(Some(FormXObject {
            matrix,
            content,
            resources,
        }))
    }

    fn page_rotation(&self, page: PageId) -> Result<u16, PdfError> {
        let dict = self.page_dict(page)?;
        let degrees = match self.find_inherited(dict, b"Rotate") {
            None => 0,
            Some(obj) => self
                .number(obj)
                .ok_or_else(|| PdfError::Parse(format!("invalid /Rotate {:?}", obj)))?
                as i64,
        };
        Ok(degrees.rem_euclid(360) as u16)
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        check_content_syntax(data)?;
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        let ops = content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect();

        Ok(ops)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
