//! Document loading, page tree access, page copying and saving
//!
//! Thin layer over `lopdf` that the page operations are written against.
//! Everything that touches the page tree or the object graph directly lives
//! here so the operations only deal with page indices.

use std::collections::HashMap;

use chrono::Utc;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// Producer string written into the `/Info` dictionary of every saved document
pub const PRODUCER: &str = concat!("pdf-pageops ", env!("CARGO_PKG_VERSION"));

/// MediaBox assumed when a page (and its ancestors) declare none: US Letter
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 32;

/// Load a document from raw bytes.
///
/// Bytes `lopdf` cannot parse, and documents without any page, are reported
/// as [`Error::MalformedSource`].
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn load(bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes).map_err(|err| Error::MalformedSource(err.to_string()))?;

    let pages = page_count(&doc);
    if pages == 0 {
        return Err(Error::MalformedSource("document has no pages".to_string()));
    }

    debug!(pages, version = %doc.version, "Document loaded");
    Ok(doc)
}

/// Create an empty document with a catalog and an empty page tree
pub fn create() -> Document {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(vec![]));
    pages.set("Count", Object::Integer(0));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));

    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

/// Number of pages in the document
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Page object ids in page order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Object id of the page at a zero-based index
pub fn page_id(doc: &Document, index: usize) -> Result<ObjectId> {
    let ids = page_ids(doc);
    ids.get(index).copied().ok_or_else(|| {
        Error::Precondition(format!(
            "Page index {} out of range (document has {} pages)",
            index,
            ids.len()
        ))
    })
}

/// Object id of the root `/Pages` node
fn pages_root(doc: &Document) -> Result<ObjectId> {
    match doc.catalog()?.get(b"Pages")? {
        Object::Reference(id) => Ok(*id),
        _ => Err(Error::General("Pages is not a reference".to_string())),
    }
}

/// Append an existing page object to the end of the page tree
pub fn append_page(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let pages_id = pages_root(doc)?;

    let pages = doc.get_dictionary_mut(pages_id)?;
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
        _ => pages.set("Kids", Object::Array(vec![Object::Reference(page_id)])),
    }
    let count = match pages.get(b"Count") {
        Ok(Object::Integer(n)) => *n,
        _ => 0,
    };
    pages.set("Count", Object::Integer(count + 1));

    doc.get_dictionary_mut(page_id)?
        .set("Parent", Object::Reference(pages_id));

    Ok(())
}

/// Add an empty page of the given size (in points) to the end of the document
pub fn add_blank_page(doc: &mut Document, width: f32, height: f32) -> Result<ObjectId> {
    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ]),
    );
    page.set("Resources", Object::Dictionary(Dictionary::new()));

    let page_id = doc.add_object(Object::Dictionary(page));
    append_page(doc, page_id)?;
    Ok(page_id)
}

/// Deep-copy the pages at `indices` from `source` to the end of `target`.
///
/// Every object a page references is cloned into `target`, so the copies share
/// nothing with the source. Objects referenced from several copied pages
/// (fonts, images) are cloned once. Attributes the source pages inherit from
/// their page tree are written onto the copies. Returns the new page ids in
/// the order of `indices`.
#[instrument(skip_all, fields(pages = indices.len()))]
pub fn copy_pages(source: &Document, target: &mut Document, indices: &[usize]) -> Result<Vec<ObjectId>> {
    let source_ids = page_ids(source);
    let selected = indices
        .iter()
        .map(|&index| {
            source_ids.get(index).copied().ok_or_else(|| {
                Error::Precondition(format!(
                    "Page index {} out of range (document has {} pages)",
                    index,
                    source_ids.len()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut copier = PageCopier::new(source);

    // Reserve ids up front so links between selected pages land on the copies
    let reserved: Vec<ObjectId> = selected
        .iter()
        .map(|&page_id| {
            let new_id = target.new_object_id();
            copier.id_map.insert(page_id, new_id);
            new_id
        })
        .collect();

    for (&page_id, &new_id) in selected.iter().zip(&reserved) {
        copier.copy_page(target, page_id, new_id)?;
        append_page(target, new_id)?;
    }

    debug!(copied_objects = copier.id_map.len(), "Pages copied");
    Ok(reserved)
}

/// Clones objects from one document into another, remembering what it cloned
struct PageCopier<'a> {
    source: &'a Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            id_map: HashMap::new(),
        }
    }

    fn copy_page(&mut self, target: &mut Document, page_id: ObjectId, new_id: ObjectId) -> Result<()> {
        let source = self.source;
        let page = source.get_dictionary(page_id)?;
        let mut copy = self.copy_dictionary(target, page)?;

        for key in INHERITABLE_ATTRIBUTES {
            if copy.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(source, page_id, key) {
                let value = self.copy_object(target, value)?;
                copy.set(key.to_vec(), value);
            }
        }

        target.objects.insert(new_id, Object::Dictionary(copy));
        Ok(())
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(id) => Ok(Object::Reference(self.copy_reference(target, *id)?)),
            Object::Array(items) => {
                let mut copied = Vec::with_capacity(items.len());
                for item in items {
                    copied.push(self.copy_object(target, item)?);
                }
                Ok(Object::Array(copied))
            }
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.copy_dictionary(target, dict)?)),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict)?;
                let mut copied = Stream::new(dict, stream.content.clone());
                copied.allows_compression = stream.allows_compression;
                Ok(Object::Stream(copied))
            }
            other => Ok(other.clone()),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            // The page tree is rebuilt by the target; never drag the source's along
            if key.as_slice() == b"Parent" && self.is_page_tree_node(value) {
                continue;
            }
            copied.set(key.clone(), self.copy_object(target, value)?);
        }
        Ok(copied)
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> Result<ObjectId> {
        if let Some(&new_id) = self.id_map.get(&id) {
            return Ok(new_id);
        }

        // Register before recursing so cycles resolve to the same copy
        let new_id = target.new_object_id();
        self.id_map.insert(id, new_id);

        let source = self.source;
        let copied = match source.get_object(id) {
            Ok(object) => self.copy_object(target, object)?,
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using null");
                Object::Null
            }
        };
        target.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn is_page_tree_node(&self, value: &Object) -> bool {
        let Object::Reference(id) = value else {
            return false;
        };
        match self.source.get_dictionary(*id) {
            Ok(dict) => matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name.as_slice() == b"Pages"),
            Err(_) => false,
        }
    }
}

/// Look up a page attribute, falling back to the page's ancestors.
///
/// The returned object is not dereferenced.
pub fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        node = match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_dictionary(*parent_id).ok()?,
            _ => return None,
        };
    }
    None
}

/// Follow a reference one step; non-references are returned as-is
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Numeric value of an Integer or Real object
pub fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Effective MediaBox of a page as `[llx, lly, urx, ury]`
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(object) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let Object::Array(values) = resolve(doc, object) else {
        return DEFAULT_MEDIA_BOX;
    };

    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|value| as_number(resolve(doc, value)))
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Width and height of a page in points
pub fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let [x0, y0, x1, y1] = media_box(doc, page_id);
    (x1 - x0, y1 - y0)
}

/// Snap an angle to the nearest quarter turn in `{0, 90, 180, 270}`
pub fn normalize_rotation(degrees: i64) -> i64 {
    let quarter_turns = (degrees as f64 / 90.0).round() as i64;
    (quarter_turns * 90).rem_euclid(360)
}

/// Current rotation of a page in degrees, normalized
pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|value| as_number(resolve(doc, value)))
        .map(|degrees| normalize_rotation(degrees.round() as i64))
        .unwrap_or(0)
}

/// Set the rotation of a page, normalized
pub fn set_rotation(doc: &mut Document, page_id: ObjectId, degrees: i64) -> Result<()> {
    doc.get_dictionary_mut(page_id)?
        .set("Rotate", Object::Integer(normalize_rotation(degrees)));
    Ok(())
}

/// Options applied when serializing a document
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Compress all streams that allow it
    pub compress: bool,
    /// Value for `/Title` in the info dictionary
    pub title: Option<String>,
    /// Value for `/Producer` in the info dictionary
    pub producer: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress: true,
            title: None,
            producer: PRODUCER.to_string(),
        }
    }
}

/// Serialize a document to bytes
#[instrument(skip_all, fields(pages = page_count(doc), compress = options.compress))]
pub fn save(doc: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    update_info(doc, options);

    if options.compress {
        doc.compress();
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)?;

    debug!(output_bytes = output.len(), "Document saved");
    Ok(output)
}

/// Drop objects nothing refers to and empty streams; returns how many were removed
pub fn compact(doc: &mut Document) -> usize {
    let pruned = doc.prune_objects().len();
    let emptied = doc.delete_zero_length_streams().len();
    pruned + emptied
}

/// Write Producer, dates and optional Title into the trailer's `/Info`
fn update_info(doc: &mut Document, options: &SaveOptions) {
    let info_ref = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let existing = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok().cloned(),
        Ok(Object::Dictionary(dict)) => Some(dict.clone()),
        _ => None,
    };
    let mut info = existing.unwrap_or_else(Dictionary::new);

    let now = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    if !info.has(b"CreationDate") {
        info.set("CreationDate", Object::String(now.clone().into_bytes(), StringFormat::Literal));
    }
    info.set("ModDate", Object::String(now.into_bytes(), StringFormat::Literal));
    info.set("Producer", text_string(&options.producer));
    if let Some(title) = &options.title {
        info.set("Title", text_string(title));
    }

    // An indirect Info keeps its object id so no stale copy is left behind
    let info_id = match info_ref {
        Some(id) if doc.objects.contains_key(&id) => {
            doc.objects.insert(id, Object::Dictionary(info));
            id
        }
        _ => doc.add_object(Object::Dictionary(info)),
    };
    doc.trailer.set("Info", Object::Reference(info_id));
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string written as PDFDocEncoding/ASCII or UTF-16BE
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_page_document() -> Document {
        let mut doc = create();
        add_blank_page(&mut doc, 200.0, 300.0).unwrap();
        add_blank_page(&mut doc, 400.0, 500.0).unwrap();
        add_blank_page(&mut doc, 600.0, 700.0).unwrap();
        doc
    }

    #[test]
    fn test_create_is_empty() {
        let doc = create();
        assert_eq!(page_count(&doc), 0);
    }

    #[test]
    fn test_add_blank_page_sets_size() {
        let doc = three_page_document();
        assert_eq!(page_count(&doc), 3);
        let second = page_id(&doc, 1).unwrap();
        assert_eq!(page_size(&doc, second), (400.0, 500.0));
    }

    #[test]
    fn test_page_id_out_of_range() {
        let doc = three_page_document();
        assert!(matches!(page_id(&doc, 3), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let result = load(b"this is not a pdf");
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_save_and_load_round_trip_page_count() {
        let mut doc = three_page_document();
        let bytes = save(&mut doc, &SaveOptions::default()).unwrap();
        let reloaded = load(&bytes).unwrap();
        assert_eq!(page_count(&reloaded), 3);
    }

    #[test]
    fn test_load_rejects_document_without_pages() {
        let mut doc = create();
        let bytes = save(&mut doc, &SaveOptions::default()).unwrap();
        assert!(matches!(load(&bytes), Err(Error::MalformedSource(_))));
    }

    #[test]
    fn test_inherited_media_box_and_rotation() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();

        // Move the MediaBox and a rotation up to the page tree root
        let root = pages_root(&doc).unwrap();
        {
            let pages = doc.get_dictionary_mut(root).unwrap();
            pages.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(300),
                    Object::Integer(400),
                ]),
            );
            pages.set("Rotate", Object::Integer(90));
        }
        doc.get_dictionary_mut(page).unwrap().remove(b"MediaBox");

        assert_eq!(page_size(&doc, page), (300.0, 400.0));
        assert_eq!(rotation(&doc, page), 90);

        // Copies carry the inherited attributes on the page itself
        let mut target = create();
        let copied = copy_pages(&doc, &mut target, &[0]).unwrap();
        let copy = target.get_dictionary(copied[0]).unwrap();
        assert!(copy.has(b"MediaBox"));
        assert_eq!(copy.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(-720), 0);
        assert_eq!(normalize_rotation(100), 90);
    }

    #[test]
    fn test_set_rotation_normalizes() {
        let mut doc = three_page_document();
        let page = page_id(&doc, 0).unwrap();
        set_rotation(&mut doc, page, -90).unwrap();
        assert_eq!(rotation(&doc, page), 270);
    }

    #[test]
    fn test_copy_pages_in_given_order() {
        let source = three_page_document();
        let mut target = create();
        let ids = copy_pages(&source, &mut target, &[2, 0]).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(page_count(&target), 2);
        assert_eq!(page_size(&target, page_id(&target, 0).unwrap()), (600.0, 700.0));
        assert_eq!(page_size(&target, page_id(&target, 1).unwrap()), (200.0, 300.0));
    }

    #[test]
    fn test_copy_pages_rejects_bad_index() {
        let source = three_page_document();
        let mut target = create();
        let result = copy_pages(&source, &mut target, &[5]);
        assert!(matches!(result, Err(Error::Precondition(_))));
        assert_eq!(page_count(&target), 0);
    }

    #[test]
    fn test_copy_shares_objects_once() {
        let mut source = three_page_document();
        let shared = source.add_object(Object::Dictionary(Dictionary::new()));
        for id in page_ids(&source) {
            let page = source.get_dictionary_mut(id).unwrap();
            page.set("Resources", Object::Reference(shared));
        }

        let mut target = create();
        let ids = copy_pages(&source, &mut target, &[0, 1, 2]).unwrap();
        let resources: Vec<&Object> = ids
            .iter()
            .map(|id| target.get_dictionary(*id).unwrap().get(b"Resources").unwrap())
            .collect();

        assert_eq!(resources[0], resources[1]);
        assert_eq!(resources[1], resources[2]);
        assert!(matches!(
            resources[0],
            Object::Reference(id) if target.get_dictionary(*id).is_ok()
        ));
    }

    fn info_dictionary_count(doc: &Document) -> usize {
        doc.objects
            .values()
            .filter(|object| matches!(object, Object::Dictionary(dict) if dict.has(b"Producer")))
            .count()
    }

    #[test]
    fn test_resave_reuses_info_object() {
        let mut doc = three_page_document();
        let bytes = save(&mut doc, &SaveOptions::default()).unwrap();

        let mut reloaded = load(&bytes).unwrap();
        let info_id = reloaded.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let options = SaveOptions {
            title: Some("Second pass".to_string()),
            ..SaveOptions::default()
        };
        let bytes = save(&mut reloaded, &options).unwrap();

        let again = load(&bytes).unwrap();
        assert_eq!(info_dictionary_count(&again), 1);
        assert_eq!(again.trailer.get(b"Info").unwrap().as_reference().unwrap(), info_id);
        let info = again.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Second pass");
    }

    #[test]
    fn test_compact_after_save_leaves_single_info() {
        let mut doc = three_page_document();
        let bytes = save(&mut doc, &SaveOptions::default()).unwrap();

        let mut reloaded = load(&bytes).unwrap();
        assert_eq!(compact(&mut reloaded), 0);
        let bytes = save(&mut reloaded, &SaveOptions::default()).unwrap();
        assert_eq!(info_dictionary_count(&load(&bytes).unwrap()), 1);
    }

    #[test]
    fn test_text_string_round_trip() {
        assert_eq!(decode_text_string(b"Plain"), "Plain");
        let Object::String(bytes, _) = text_string("Über") else {
            panic!("expected a string object");
        };
        assert_eq!(decode_text_string(&bytes), "Über");
    }
}
