//! Merging documents

use lopdf::Document;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::pdf::document::{copy_pages, create, page_count};

/// Concatenate the pages of several documents into a new document
///
/// Pages appear in list order, each document's pages in their own order.
/// Every page is deep copied, so the result shares nothing with the sources.
///
/// # Example
///
/// ```
/// use pdf_pageops::pdf::document::{add_blank_page, create, page_count};
/// use pdf_pageops::pdf::merge;
///
/// let mut first = create();
/// add_blank_page(&mut first, 612.0, 792.0).unwrap();
/// let mut second = create();
/// add_blank_page(&mut second, 595.0, 842.0).unwrap();
///
/// let merged = merge(&[first, second]).unwrap();
/// assert_eq!(page_count(&merged), 2);
/// ```
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn merge(documents: &[Document]) -> Result<Document> {
    if documents.len() < 2 {
        return Err(Error::Precondition(
            "Select at least two PDF files to merge".to_string(),
        ));
    }

    let mut merged = create();
    for source in documents {
        let all: Vec<usize> = (0..page_count(source)).collect();
        copy_pages(source, &mut merged, &all)?;
    }

    info!(pages = page_count(&merged), "Documents merged");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{add_blank_page, page_id, page_size};

    fn document_with_widths(widths: &[f32]) -> Document {
        let mut doc = create();
        for &width in widths {
            add_blank_page(&mut doc, width, 100.0).unwrap();
        }
        doc
    }

    fn widths(doc: &Document) -> Vec<f32> {
        (0..page_count(doc))
            .map(|index| page_size(doc, page_id(doc, index).unwrap()).0)
            .collect()
    }

    #[test]
    fn test_merge_keeps_document_and_page_order() {
        let a = document_with_widths(&[101.0, 102.0]);
        let b = document_with_widths(&[203.0]);
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(widths(&merged), vec![101.0, 102.0, 203.0]);
    }

    #[test]
    fn test_merge_requires_two_documents() {
        let a = document_with_widths(&[100.0]);
        assert!(matches!(merge(&[a]), Err(Error::Precondition(_))));
        assert!(matches!(merge(&[]), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_merge_same_document_twice() {
        let a = document_with_widths(&[110.0, 120.0]);
        let merged = merge(&[a.clone(), a]).unwrap();
        assert_eq!(widths(&merged), vec![110.0, 120.0, 110.0, 120.0]);
    }
}
