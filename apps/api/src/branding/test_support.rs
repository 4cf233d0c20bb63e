//! In-memory PDF fixtures shared by the branding tests.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

/// One page per `(width, height)`, each with its own MediaBox at the origin.
pub fn sample_pdf(sizes: &[(f64, f64)]) -> Vec<u8> {
    let boxes: Vec<[f64; 4]> = sizes.iter().map(|&(w, h)| [0.0, 0.0, w, h]).collect();
    build_pdf(&boxes, false, None)
}

/// One page per box, allowing a non-zero MediaBox origin.
pub fn pdf_with_boxes(boxes: &[[f64; 4]]) -> Vec<u8> {
    build_pdf(boxes, false, None)
}

/// `pages` pages that inherit a single MediaBox from the page tree root.
pub fn pdf_with_inherited_box(width: f64, height: f64, pages: usize) -> Vec<u8> {
    let boxes = vec![[0.0, 0.0, width, height]; pages];
    build_pdf(&boxes, true, None)
}

/// A structurally valid PDF whose page tree is empty.
pub fn empty_pdf() -> Vec<u8> {
    build_pdf(&[], false, None)
}

/// A single 612x792 page whose content stream claims `filter`, with the
/// operators stored as-is.
pub fn pdf_with_content_filter(filter: &[u8]) -> Vec<u8> {
    build_pdf(&[[0.0, 0.0, 612.0, 792.0]], false, Some(filter))
}

fn box_array(b: [f64; 4]) -> Object {
    Object::Array(b.iter().map(|&v| Object::Real(v as f32)).collect())
}

fn build_pdf(boxes: &[[f64; 4]], inherit: bool, content_filter: Option<&[u8]>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for (i, b) in boxes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(72)]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let mut stream_dict = Dictionary::new();
        if let Some(filter) = content_filter {
            stream_dict.set("Filter", Object::Name(filter.to_vec()));
        }
        let content_id = doc.add_object(Stream::new(stream_dict, content.encode().unwrap()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Reference(resources_id));
        if !inherit {
            page.set("MediaBox", box_array(*b));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    if inherit {
        if let Some(b) = boxes.first() {
            pages.set("MediaBox", box_array(*b));
        }
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
