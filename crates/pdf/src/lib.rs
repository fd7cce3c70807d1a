use std::path::Path;

use thiserror::Error;

use parser::backend::{LopdfBackend, PageId, PdfBackend};

pub mod annotation;
pub mod page;
pub mod parser;
pub mod types;

pub use page::Page;
pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// An open PDF document.
///
/// Constructed via [`PdfDocument::open`] or [`PdfDocument::from_bytes`].
/// Pages are analysed on demand; annotations are written into the in-memory
/// document and persisted with [`PdfDocument::save`].
pub struct PdfDocument {
    backend: LopdfBackend,
    /// Page object ids in document order (index 0 is the first page).
    page_ids: Vec<PageId>,
}

impl PdfDocument {
    /// Open and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let backend = LopdfBackend::load_path(path.as_ref())?;
        Ok(Self::with_backend(backend))
    }

    /// Parse PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        Ok(Self::with_backend(backend))
    }

    fn with_backend(backend: LopdfBackend) -> Self {
        let page_ids = backend.pages().into_values().collect();
        Self { backend, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<PageId, PdfError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    /// Page box of the page at `index`, in top-left page space.
    pub fn page_rect(&self, index: usize) -> Result<Rect, PdfError> {
        let b = self.backend.page_box(self.page_id(index)?)?;
        Ok(Rect::new(0.0, 0.0, b[2] - b[0], b[3] - b[1]))
    }

    /// Analyse the page at `index` (0-based).
    pub fn page(&self, index: usize) -> Result<Page, PdfError> {
        let page_id = self.page_id(index)?;
        let content = parser::content::extract_page(&self.backend, page_id)?;
        log::debug!(
            "page {}: {} drawings, {} spans",
            index,
            content.drawings.len(),
            content.spans.len()
        );

        Ok(Page {
            index,
            rect: content.rect,
            drawings: content.drawings,
            blocks: parser::layout::analyze(content.spans),
            rotation: content.rotation,
        })
    }

    /// Analyse every page in document order.
    pub fn pages(&self) -> Result<Vec<Page>, PdfError> {
        (0..self.page_count()).map(|i| self.page(i)).collect()
    }

    /// Add a sticky-note annotation whose icon's top-left corner sits at
    /// `point` on the page at `index`.
    pub fn add_text_annotation(
        &mut self,
        index: usize,
        point: Point,
        contents: &str,
        title: &str,
    ) -> Result<(), PdfError> {
        let page_id = self.page_id(index)?;
        let page_box = self.backend.page_box(page_id)?;
        let modified = chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string();
        let note = TextAnnotation::note(contents, title);

        annotation::add_text_annotation(
            self.backend.raw_doc_mut(),
            page_id,
            page_box,
            point,
            &note,
            &modified,
        )?;
        Ok(())
    }

    /// Serialize the document, including any added annotations.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.backend
            .raw_doc_mut()
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Parse(format!("cannot serialize document: {}", e)))?;
        Ok(buffer)
    }

    /// Write the document to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// A single Letter page with a yellow box and a line of Courier text
    /// running past it.
    fn sample_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.7");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let content = b"1 1 0 rg 72 680 150 20 re f \
            BT /F1 10 Tf 72 686 Td (let value = compute_something_long[alpha, beta];) Tj ET"
            .to_vec();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn ints(values: &[i64]) -> Vec<Object> {
        values.iter().map(|v| Object::Integer(*v)).collect()
    }

    /// A Letter page whose resources name Form XObject `/X1`. The form is
    /// shifted down 100pt by its matrix, names Courier as `/F2` and can
    /// draw itself through its own `/X1`.
    fn wrapped_pdf(page_content: &[u8], form_body: &[u8], rotate: Option<i64>) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.7");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let form_id = doc.new_object_id();
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => ints(&[0, 0, 612, 792]),
                    "Matrix" => ints(&[1, 0, 0, 1, 0, -100]),
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "F2" => font_id },
                        "XObject" => dictionary! { "X1" => form_id },
                    },
                },
                form_body.to_vec(),
            )),
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content.to_vec()));
        let pages_id = doc.new_object_id();
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => ints(&[0, 0, 612, 792]),
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "X1" => form_id },
            },
        };
        if let Some(degrees) = rotate {
            page.set("Rotate", degrees);
        }
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    const FORM_BODY: &[u8] = b"1 1 0 rg 72 680 150 20 re f \
        BT /F2 10 Tf 72 686 Td (let value = compute;) Tj ET";

    #[test]
    fn test_form_xobject_content_is_drawn() {
        let bytes = wrapped_pdf(
            b"q 1 0 0 1 0 -200 cm /X1 Do Q 1 1 0 rg 10 10 5 5 re f",
            FORM_BODY,
            None,
        );
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        let page = doc.page(0).unwrap();

        // Form matrix and page `cm` both apply: 680 - 100 - 200 = 380.
        assert_eq!(page.drawings.len(), 2);
        assert_eq!(page.drawings[0].rect, Rect::new(72.0, 392.0, 222.0, 412.0));
        assert_eq!(page.drawings[0].fill, Some(Rgb::YELLOW));
        // The state saved around the form is restored afterwards.
        assert_eq!(page.drawings[1].rect, Rect::new(10.0, 777.0, 15.0, 782.0));

        let spans: Vec<&TextSpan> = page.spans().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "let value = compute;");
        assert_eq!(spans[0].font_name, "Courier");
        assert!((spans[0].origin.y - 406.0).abs() < 0.01);
        assert_eq!(page.textbox(&page.drawings[0].rect), "let value = compute;");
    }

    #[test]
    fn test_form_drawing_itself_is_a_parse_error() {
        let bytes = wrapped_pdf(b"/X1 Do", b"0 0 1 1 re f /X1 Do", None);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert!(matches!(doc.page(0), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_malformed_content_is_a_parse_error() {
        let bytes = wrapped_pdf(
            b"1 1 0 rg 72 680 150 20 re f BT /F1 10 Tf (unterminated <<< [ ) Tj ET ]] >> {",
            FORM_BODY,
            None,
        );
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert!(matches!(doc.page(0), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_page_rotation_is_normalised() {
        let doc = PdfDocument::from_bytes(&wrapped_pdf(b"/X1 Do", FORM_BODY, None)).unwrap();
        assert_eq!(doc.page(0).unwrap().rotation, 0);

        let doc = PdfDocument::from_bytes(&wrapped_pdf(b"/X1 Do", FORM_BODY, Some(90))).unwrap();
        assert_eq!(doc.page(0).unwrap().rotation, 90);

        let doc = PdfDocument::from_bytes(&wrapped_pdf(b"/X1 Do", FORM_BODY, Some(-90))).unwrap();
        assert_eq!(doc.page(0).unwrap().rotation, 270);
    }

    #[test]
    fn test_open_rejects_empty_bytes() {
        assert!(PdfDocument::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = PdfDocument::from_bytes(&sample_pdf()).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert!(matches!(
            doc.page(3),
            Err(PdfError::PageOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_page_drawings_and_text() {
        let doc = PdfDocument::from_bytes(&sample_pdf()).unwrap();
        let page = doc.page(0).unwrap();

        assert_eq!(page.rect, Rect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(page.drawings.len(), 1);
        assert_eq!(page.drawings[0].rect, Rect::new(72.0, 92.0, 222.0, 112.0));
        assert_eq!(page.drawings[0].fill, Some(Rgb::YELLOW));

        let spans: Vec<&TextSpan> = page.spans().collect();
        assert_eq!(spans.len(), 1);
        assert!((spans[0].font_size - 10.0).abs() < 0.01);
        // 48 glyphs at the 5pt fallback width run well past the box.
        assert!((spans[0].bbox.x1 - 312.0).abs() < 0.01);

        let clipped = page.textbox(&page.drawings[0].rect);
        assert!(clipped.starts_with("let value = compute"));
        assert!(!clipped.contains("beta"));
    }

    #[test]
    fn test_annotation_round_trip() {
        let mut doc = PdfDocument::from_bytes(&sample_pdf()).unwrap();
        doc.add_text_annotation(0, Point::new(222.0, 92.0), "Code running into margin.", "t")
            .unwrap();
        assert!(doc.add_text_annotation(1, Point::new(0.0, 0.0), "x", "t").is_err());

        let bytes = doc.to_bytes().unwrap();
        let reloaded = lopdf::Document::load_mem(&bytes).unwrap();
        let page_id = reloaded.get_pages()[&1];
        let annots = reloaded
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(annots.len(), 1);

        let annot = reloaded
            .get_dictionary(annots[0].as_reference().unwrap())
            .unwrap();
        assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Text");
        assert_eq!(
            annot.get(b"Contents").unwrap().as_str().unwrap(),
            b"Code running into margin."
        );
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut doc = PdfDocument::from_bytes(&sample_pdf()).unwrap();
        doc.save(&path).unwrap();

        let reopened = PdfDocument::open(&path).unwrap();
        assert_eq!(reopened.page_count(), 1);
    }
}
