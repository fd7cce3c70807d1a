//! In-memory PDFs shared by the unit tests.

use lopdf::{dictionary, Document, Object, Stream};

/// A Letter-size document with one page per content stream, each page
/// using Courier as `/F1`.
pub fn pdf_with_pages(contents: &[&[u8]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
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

/// A single Letter page that draws `body` through Form XObject `/X1`. The
/// form has no resources of its own and uses the page's Courier `/F1`.
pub fn pdf_with_form_page(body: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        },
        body.to_vec(),
    ));
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"q /X1 Do Q".to_vec()));
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "X1" => form_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
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

/// Yellow highlight at (100,100)-(300,120) in page space with 10pt code
/// running 100pt past its right edge, and a second highlight whose code fits.
pub const OVERFLOW_PAGE: &[u8] = b"1 1 0 rg 100 672 200 20 re f \
    100 472 200 20 re f \
    BT /F1 10 Tf 100 676 Td (let total = items.iter.map[price].sum_with_discount_applied;) Tj ET \
    BT /F1 10 Tf 100 476 Td (let x = 1;) Tj ET";

/// Text only, no highlights.
pub const PLAIN_PAGE: &[u8] = b"BT /F1 10 Tf 72 700 Td (Chapter one) Tj ET";

/// A grey box behind text that overflows it.
pub const GREY_BOX_PAGE: &[u8] = b"0.9 g 100 672 200 20 re f \
    BT /F1 10 Tf 100 676 Td (let total = items.iter.map[price].sum_with_discount_applied;) Tj ET";
