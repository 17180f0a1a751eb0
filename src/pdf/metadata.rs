//! PDF metadata extraction

use lopdf::{Dictionary, Document, Object};

use crate::error::{Error, Result};
use crate::pdf::document::{decode_text_string, page_ids, page_size, resolve, rotation};

/// Size and rotation of one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Width in points, before rotation
    pub width: f32,
    /// Height in points, before rotation
    pub height: f32,
    /// Rotation in degrees: 0, 90, 180 or 270
    pub rotation: i64,
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Producing application (if present)
    pub producer: Option<String>,
    /// Per-page geometry, in page order
    pub pages: Vec<PageInfo>,
}

/// Extract metadata from a loaded document
pub fn extract_metadata(doc: &Document) -> Result<PdfMetadata> {
    let pages: Vec<PageInfo> = page_ids(doc)
        .into_iter()
        .map(|id| {
            let (width, height) = page_size(doc, id);
            PageInfo {
                width,
                height,
                rotation: rotation(doc, id),
            }
        })
        .collect();

    if pages.is_empty() {
        return Err(Error::MalformedSource("document has no pages".to_string()));
    }

    let info = info_dictionary(doc);
    let field = |key: &[u8]| info.and_then(|dict| info_string(doc, dict, key));

    Ok(PdfMetadata {
        page_count: pages.len(),
        title: field(b"Title"),
        author: field(b"Author"),
        producer: field(b"Producer"),
        pages,
    })
}

/// The trailer's `/Info` dictionary, direct or referenced
fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok().map(|info| resolve(doc, info)) {
        Some(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}

/// A non-empty text string entry of the info dictionary
fn info_string(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok().map(|value| resolve(doc, value)) {
        Some(Object::String(bytes, _)) => {
            let text = decode_text_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}
