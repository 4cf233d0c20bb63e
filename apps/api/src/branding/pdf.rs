//! PDF compositing on top of `lopdf`.
//!
//! Each source page (the letterhead's first page and every content page) is
//! wrapped in a Form XObject that keeps the page's own resources. A composite
//! page is a fresh page sized to the letterhead that draws the letterhead form
//! first and the transformed content form on top of it.
//!
//! The parsed letterhead is never mutated: every output document imports a
//! clone of it, and all pages of that output share one letterhead form.
//!
//! Only the page content and its resources are carried over. Page `/Rotate`,
//! annotations (links included) and outlines are dropped.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::branding::geometry::{compute_placement, FitSettings, PageSize, Placement};
use crate::branding::BrandError;

const LETTERHEAD_XOBJECT: &[u8] = b"Lh";
const CONTENT_XOBJECT: &[u8] = b"Cv";
/// Guards the Parent walk against cyclic page trees.
const MAX_TREE_DEPTH: usize = 32;

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

/// A page's MediaBox, normalised so that `llx < urx` and `lly < ury`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn size(&self) -> PageSize {
        PageSize::new(self.urx - self.llx, self.ury - self.lly)
    }

    fn to_object(self) -> Object {
        Object::Array(vec![
            real(self.llx),
            real(self.lly),
            real(self.urx),
            real(self.ury),
        ])
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn parse_box(doc: &Document, obj: &Object) -> Option<PageBox> {
    let items = resolve(doc, obj)?.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut v = [0.0_f64; 4];
    for (slot, item) in v.iter_mut().zip(items) {
        *slot = as_number(resolve(doc, item)?)?;
    }
    let page_box = PageBox {
        llx: v[0].min(v[2]),
        lly: v[1].min(v[3]),
        urx: v[0].max(v[2]),
        ury: v[1].max(v[3]),
    };
    (page_box.urx > page_box.llx && page_box.ury > page_box.lly).then_some(page_box)
}

/// Reads the (possibly inherited) MediaBox of a page.
///
/// `page_number` is 1-based and only used for the error.
pub fn page_box(
    doc: &Document,
    page_id: ObjectId,
    page_number: u32,
) -> Result<PageBox, BrandError> {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| parse_box(doc, obj))
        .ok_or(BrandError::PageGeometry { page: page_number })
}

/// Concatenates a page's content streams, decoded.
///
/// The result goes into an unfiltered form stream, so a stream whose filters
/// cannot be decoded fails the page instead of being copied still encoded.
fn page_content(
    doc: &Document,
    page_id: ObjectId,
    page_number: u32,
) -> Result<Vec<u8>, BrandError> {
    let mut content = Vec::new();
    for stream_id in doc.get_page_contents(page_id) {
        let Ok(stream) = doc.get_object(stream_id).and_then(Object::as_stream) else {
            continue;
        };
        if stream.dict.has(b"Filter") {
            let data = stream
                .decompressed_content()
                .map_err(|e| BrandError::PageContent {
                    page: page_number,
                    reason: e.to_string(),
                })?;
            content.extend_from_slice(&data);
        } else {
            content.extend_from_slice(&stream.content);
        }
        content.push(b'\n');
    }
    Ok(content)
}

// ────────────────────────────────────────────────────────────────────────────
// Parsed inputs
// ────────────────────────────────────────────────────────────────────────────

/// The background template. Parsed once per run, read-only afterwards.
#[derive(Clone)]
pub struct Letterhead {
    document: Document,
    page_box: PageBox,
}

impl Letterhead {
    /// Parses letterhead bytes and reads the geometry of its first page.
    pub fn parse(bytes: &[u8]) -> Result<Self, BrandError> {
        let document =
            Document::load_mem(bytes).map_err(|e| BrandError::LetterheadParse(e.to_string()))?;
        let page_id = *document
            .get_pages()
            .values()
            .next()
            .ok_or(BrandError::LetterheadEmpty)?;
        let page_box = page_box(&document, page_id, 1)
            .and_then(|page_box| page_content(&document, page_id, 1).map(|_| page_box))
            .map_err(|e| BrandError::LetterheadParse(e.to_string()))?;
        Ok(Self { document, page_box })
    }

    pub fn size(&self) -> PageSize {
        self.page_box.size()
    }
}

/// An uploaded document whose pages will be composited.
pub struct SourceDocument {
    document: Document,
}

impl SourceDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, BrandError> {
        let document =
            Document::load_mem(bytes).map_err(|e| BrandError::DocumentParse(e.to_string()))?;
        if document.get_pages().is_empty() {
            return Err(BrandError::DocumentEmpty);
        }
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Import
// ────────────────────────────────────────────────────────────────────────────

struct FormPage {
    form_id: ObjectId,
    page_box: PageBox,
}

/// Moves `source` into `out` and wraps up to `limit` of its pages as Form
/// XObjects, in page order.
///
/// Source objects are renumbered above `out`'s ids first so references stay
/// valid. Page-tree nodes are dropped; whatever they referenced and is no
/// longer reachable is pruned when the output is finished.
fn import_pages(
    out: &mut Document,
    mut source: Document,
    limit: usize,
) -> Result<Vec<FormPage>, BrandError> {
    source.renumber_objects_with(out.max_id + 1);
    let top = source.objects.keys().map(|&(id, _)| id).max().unwrap_or(0);
    out.max_id = out.max_id.max(top);

    let mut pending = Vec::new();
    for (&number, &page_id) in source.get_pages().iter().take(limit) {
        let page_box = page_box(&source, page_id, number)?;

        let mut form = Dictionary::new();
        form.set("Type", Object::Name(b"XObject".to_vec()));
        form.set("Subtype", Object::Name(b"Form".to_vec()));
        form.set("FormType", Object::Integer(1));
        form.set("BBox", page_box.to_object());
        if let Some(resources) = inherited_attribute(&source, page_id, b"Resources") {
            form.set("Resources", resources.clone());
        }

        let content = page_content(&source, page_id, number)?;
        pending.push((form, content, page_box));
    }

    for (object_id, object) in source.objects {
        match object.type_name().unwrap_or("") {
            "Catalog" | "Pages" | "Page" | "Outlines" | "Outline" => {}
            _ => {
                out.objects.insert(object_id, object);
            }
        }
    }

    Ok(pending
        .into_iter()
        .map(|(form, content, page_box)| FormPage {
            form_id: out.add_object(Stream::new(form, content)),
            page_box,
        })
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Composition
// ────────────────────────────────────────────────────────────────────────────

/// An assembled output document, one composite page per source page.
pub struct ComposedDocument {
    document: Document,
    placements: Vec<Placement>,
}

impl ComposedDocument {
    pub fn page_count(&self) -> usize {
        self.placements.len()
    }

    /// Placement used for each page, in page order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Compresses and serialises the document.
    pub fn to_bytes(mut self) -> Result<Vec<u8>, BrandError> {
        self.document.compress();
        let mut buffer = Vec::new();
        self.document
            .save_to(&mut buffer)
            .map_err(|e| BrandError::Serialize(e.to_string()))?;
        Ok(buffer)
    }
}

fn transform(scale: f64, tx: f64, ty: f64) -> Operation {
    Operation::new(
        "cm",
        [scale, 0.0, 0.0, scale, tx, ty].into_iter().map(real).collect(),
    )
}

fn draw_form(name: &[u8], matrix: Operation) -> [Operation; 4] {
    [
        Operation::new("q", vec![]),
        matrix,
        Operation::new("Do", vec![Object::Name(name.to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

fn add_composite_page(
    out: &mut Document,
    pages_id: ObjectId,
    target: PageSize,
    background: &FormPage,
    content: &FormPage,
    placement: &Placement,
) -> Result<ObjectId, BrandError> {
    let bg = background.page_box;
    let fg = content.page_box;
    let s = placement.scale;

    // Letterhead first, content on top. Both forms are shifted so their box
    // origin lands where the placement expects it.
    let mut operations = Vec::with_capacity(8);
    operations.extend(draw_form(LETTERHEAD_XOBJECT, transform(1.0, -bg.llx, -bg.lly)));
    operations.extend(draw_form(
        CONTENT_XOBJECT,
        transform(
            s,
            placement.x_offset - s * fg.llx,
            placement.y_offset - s * fg.lly,
        ),
    ));
    let stream = Content { operations }
        .encode()
        .map_err(|e| BrandError::Serialize(e.to_string()))?;
    let content_id = out.add_object(Stream::new(Dictionary::new(), stream));

    let mut xobjects = Dictionary::new();
    xobjects.set(LETTERHEAD_XOBJECT, Object::Reference(background.form_id));
    xobjects.set(CONTENT_XOBJECT, Object::Reference(content.form_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            real(0.0),
            real(0.0),
            real(target.width),
            real(target.height),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));

    Ok(out.add_object(page))
}

/// Builds the output document for `source`: every page, in order, placed on
/// a fresh copy of the letterhead page.
pub fn compose(
    letterhead: &Letterhead,
    source: SourceDocument,
    settings: &FitSettings,
) -> Result<ComposedDocument, BrandError> {
    let mut out = Document::with_version("1.7");
    let pages_id = out.new_object_id();

    let background = import_pages(&mut out, letterhead.document.clone(), 1)?
        .into_iter()
        .next()
        .ok_or(BrandError::LetterheadEmpty)?;
    let target = background.page_box.size();
    let content_pages = import_pages(&mut out, source.document, usize::MAX)?;

    let mut kids = Vec::with_capacity(content_pages.len());
    let mut placements = Vec::with_capacity(content_pages.len());
    for page in &content_pages {
        let placement = compute_placement(target, page.page_box.size(), settings);
        let page_id =
            add_composite_page(&mut out, pages_id, target, &background, page, &placement)?;
        kids.push(Object::Reference(page_id));
        placements.push(placement);
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    out.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = out.add_object(catalog);
    out.trailer.set("Root", Object::Reference(catalog_id));

    out.prune_objects();
    out.renumber_objects();

    Ok(ComposedDocument {
        document: out,
        placements,
    })
}
