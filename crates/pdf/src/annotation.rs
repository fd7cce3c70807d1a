//! Sticky-note annotation writing.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::parser::backend::encode_text_string;
use crate::types::{Point, TextAnnotation};
use crate::PdfError;

/// Side length of the note icon, in points.
pub const ICON_SIZE: f32 = 20.0;

fn lopdf_err(e: lopdf::Error) -> PdfError {
    PdfError::Parse(e.to_string())
}

fn text_string(text: &str) -> Object {
    let format = if text.is_ascii() {
        StringFormat::Literal
    } else {
        StringFormat::Hexadecimal
    };
    Object::String(encode_text_string(text), format)
}

/// User-space `/Rect` for a note whose icon's top-left corner sits at
/// `point` (top-left page space) on a page with the given box.
pub fn icon_rect(point: Point, page_box: [f32; 4]) -> [f32; 4] {
    let x = point.x + page_box[0];
    let top = page_box[3] - point.y;
    [x, top - ICON_SIZE, x + ICON_SIZE, top]
}

/// Build the annotation dictionary. `modified` is a PDF date string
/// (`D:YYYYMMDDHHmmSS...`).
pub fn annotation_dictionary(
    page_id: ObjectId,
    rect: [f32; 4],
    annotation: &TextAnnotation,
    modified: &str,
) -> Dictionary {
    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"Text".to_vec()));
    annot.set(
        "Rect",
        Object::Array(rect.iter().map(|v| Object::Real(*v)).collect()),
    );
    annot.set("Contents", text_string(&annotation.contents));
    annot.set("T", text_string(&annotation.title));
    annot.set(
        "M",
        Object::String(modified.as_bytes().to_vec(), StringFormat::Literal),
    );
    annot.set("Name", Object::Name(annotation.icon.as_bytes().to_vec()));
    // Print flag.
    annot.set("F", Object::Integer(4));
    annot.set(
        "C",
        Object::Array(vec![
            Object::Real(annotation.color.r),
            Object::Real(annotation.color.g),
            Object::Real(annotation.color.b),
        ]),
    );
    annot.set("Open", Object::Boolean(false));
    annot.set("P", Object::Reference(page_id));
    annot
}

/// Add `annotation` to the page and return the new annotation's object id.
pub fn add_text_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    page_box: [f32; 4],
    point: Point,
    annotation: &TextAnnotation,
    modified: &str,
) -> Result<ObjectId, PdfError> {
    let dict = annotation_dictionary(page_id, icon_rect(point, page_box), annotation, modified);
    let annot_id = doc.add_object(Object::Dictionary(dict));
    add_annotation_to_page(doc, page_id, annot_id)?;
    Ok(annot_id)
}

/// Append `annot_id` to the page's `/Annots`, which may be inline, indirect
/// or missing.
fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), PdfError> {
    let existing = doc
        .get_dictionary(page_id)
        .map_err(lopdf_err)?
        .get(b"Annots")
        .ok()
        .cloned();

    if let Some(Object::Reference(array_id)) = existing {
        if let Ok(Object::Array(arr)) = doc.get_object_mut(array_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(lopdf_err)?;
    if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    const DATE: &str = "D:20260102030405Z";

    fn one_page_doc(annots: Option<Object>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };
        if let Some(annots) = annots {
            page.set("Annots", annots);
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
        (doc, page_id)
    }

    fn annots_of(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
        let obj = doc.get_dictionary(page_id).unwrap().get(b"Annots").unwrap();
        let arr = match obj {
            Object::Reference(id) => doc.get_object(*id).unwrap().as_array().unwrap(),
            Object::Array(arr) => arr,
            other => panic!("unexpected Annots: {:?}", other),
        };
        arr.iter().map(|o| o.as_reference().unwrap()).collect()
    }

    #[test]
    fn test_icon_rect_flips_to_user_space() {
        let rect = icon_rect(Point::new(612.0, 100.0), [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(rect, [612.0, 672.0, 632.0, 692.0]);
    }

    #[test]
    fn test_icon_rect_respects_box_origin() {
        let rect = icon_rect(Point::new(10.0, 10.0), [50.0, 50.0, 250.0, 350.0]);
        assert_eq!(rect, [60.0, 320.0, 80.0, 340.0]);
    }

    #[test]
    fn test_dictionary_fields() {
        let annotation = TextAnnotation::note("Code running into margin.", "Margin Check");
        let dict = annotation_dictionary((3, 0), [1.0, 2.0, 21.0, 22.0], &annotation, DATE);

        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Text");
        assert_eq!(dict.get(b"Name").unwrap().as_name().unwrap(), b"Note");
        assert_eq!(
            dict.get(b"Contents").unwrap().as_str().unwrap(),
            b"Code running into margin."
        );
        assert_eq!(dict.get(b"T").unwrap().as_str().unwrap(), b"Margin Check");
        assert_eq!(dict.get(b"M").unwrap().as_str().unwrap(), DATE.as_bytes());
        assert_eq!(dict.get(b"P").unwrap().as_reference().unwrap(), (3, 0));
        assert_eq!(dict.get(b"F").unwrap().as_i64().unwrap(), 4);
    }

    #[test]
    fn test_non_ascii_contents_are_utf16() {
        let annotation = TextAnnotation::note("naïve", "t");
        let dict = annotation_dictionary((3, 0), [0.0; 4], &annotation, DATE);
        let bytes = dict.get(b"Contents").unwrap().as_str().unwrap();
        assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
    }

    #[test]
    fn test_creates_annots_when_missing() {
        let (mut doc, page_id) = one_page_doc(None);
        let annotation = TextAnnotation::note("x", "t");
        let id = add_text_annotation(
            &mut doc,
            page_id,
            [0.0, 0.0, 612.0, 792.0],
            Point::new(0.0, 0.0),
            &annotation,
            DATE,
        )
        .unwrap();

        assert_eq!(annots_of(&doc, page_id), vec![id]);
    }

    #[test]
    fn test_appends_to_inline_annots() {
        let (mut doc, page_id) = one_page_doc(Some(Object::Array(vec![Object::Reference((90, 0))])));
        let annotation = TextAnnotation::note("x", "t");
        let id = add_text_annotation(
            &mut doc,
            page_id,
            [0.0, 0.0, 612.0, 792.0],
            Point::new(0.0, 0.0),
            &annotation,
            DATE,
        )
        .unwrap();

        assert_eq!(annots_of(&doc, page_id), vec![(90, 0), id]);
    }

    #[test]
    fn test_appends_to_indirect_annots() {
        let mut doc = Document::with_version("1.7");
        let array_id = doc.add_object(Object::Array(vec![]));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Annots" => array_id,
        });

        let annotation = TextAnnotation::note("x", "t");
        let id = add_text_annotation(
            &mut doc,
            page_id,
            [0.0, 0.0, 612.0, 792.0],
            Point::new(5.0, 5.0),
            &annotation,
            DATE,
        )
        .unwrap();

        // The page still points at the shared array.
        let annots = doc.get_dictionary(page_id).unwrap().get(b"Annots").unwrap();
        assert_eq!(annots.as_reference().unwrap(), array_id);
        assert_eq!(annots_of(&doc, page_id), vec![id]);
    }
}
