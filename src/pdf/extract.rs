//! Extracting a subset of pages

use lopdf::Document;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::pdf::document::{copy_pages, create};

/// New document holding copies of the pages at `indices`, in that order
#[instrument(skip_all, fields(pages = indices.len()))]
pub fn extract(source: &Document, indices: &[usize]) -> Result<Document> {
    if indices.is_empty() {
        return Err(Error::Precondition("No pages to extract".to_string()));
    }

    let mut extracted = create();
    copy_pages(source, &mut extracted, indices)?;

    info!(pages = indices.len(), "Pages extracted");
    Ok(extracted)
}
