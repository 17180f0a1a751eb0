//! Operations as callers see them
//!
//! Each operation takes source bytes and typed parameters and returns either a
//! complete serialized document with a suggested filename, or a [`Failure`].
//! Sources are never modified and no partial output is ever returned.

use std::fs;
use std::io::Write;
use std::path::Path;

use lopdf::Document;
use tracing::{info, instrument};

use crate::error::{Error, Failure};
use crate::layout::PageDimensions;
use crate::pdf::document::{self, compact, SaveOptions};
use crate::pdf::{
    self, ImageAsset, PdfMetadata, RotationDirection, TextDocumentSpec, WatermarkConfig,
};
use crate::range::select_pages;

/// Filename of a merged document
pub const MERGED_FILENAME: &str = "merged-document.pdf";

/// Filename of a document built from images
pub const IMAGES_FILENAME: &str = "images-to-pdf.pdf";

/// Result type of every operation
pub type OpResult<T> = std::result::Result<T, Failure>;

/// A named source document, as supplied by the caller
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Original file name; only its final path component is used
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a source from disk, named after the file
    pub fn read(path: &Path) -> OpResult<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()).into());
        }
        let bytes = fs::read(path).map_err(Error::from)?;
        Ok(Self::new(path.to_string_lossy(), bytes))
    }

    fn load(&self) -> OpResult<Document> {
        document::load(&self.bytes).map_err(|err| match err {
            Error::MalformedSource(reason) => {
                Error::MalformedSource(format!("{}: {}", self.file_name(), reason)).into()
            }
            other => other.into(),
        })
    }

    fn file_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.name)
    }
}

/// A finished document ready to be handed back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub bytes: Vec<u8>,
    /// Suggested file name
    pub filename: String,
}

impl Output {
    /// Write the output to `path` without ever leaving a partial file behind
    ///
    /// The bytes go to a temporary file in the same directory, which is then
    /// renamed over `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        let temp_path = dir.join(format!(".{}.{}.part", file_name, std::process::id()));

        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(&self.bytes)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|_| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
        Ok(())
    }
}

/// Size of a document before and after compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    /// Objects removed because nothing referenced them
    pub removed_objects: usize,
}

/// `<prefix><name>`, using only the final path component of `name`
pub fn output_name(prefix: &str, name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|base| base.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{}{}", prefix, base)
}

/// Serialize `doc` as the result of an operation
fn deliver(mut doc: Document, filename: String, options: &SaveOptions) -> OpResult<Output> {
    let bytes = document::save(&mut doc, options)?;
    info!(filename = %filename, bytes = bytes.len(), "Output ready");
    Ok(Output { bytes, filename })
}

/// Combine all pages of `sources`, in order
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn merge(sources: &[SourceDocument]) -> OpResult<Output> {
    if sources.len() < 2 {
        return Err(Error::Precondition("Select at least two PDF files to merge".to_string()).into());
    }
    let documents = sources
        .iter()
        .map(SourceDocument::load)
        .collect::<OpResult<Vec<_>>>()?;

    let merged = pdf::merge(&documents)?;
    deliver(merged, MERGED_FILENAME.to_string(), &SaveOptions::default())
}

/// Copy the pages selected by `pages` into a new document
#[instrument(skip_all, fields(source = %source.name, pages = %pages))]
pub fn extract(source: &SourceDocument, pages: &str) -> OpResult<Output> {
    let doc = source.load()?;
    let indices = select_pages(pages, document::page_count(&doc))?;

    let extracted = pdf::extract(&doc, &indices)?;
    deliver(extracted, output_name("extracted_", &source.name), &SaveOptions::default())
}

/// Turn the pages selected by `pages` a quarter turn in `direction`
#[instrument(skip_all, fields(source = %source.name, pages = %pages, direction = ?direction))]
pub fn rotate(source: &SourceDocument, pages: &str, direction: RotationDirection) -> OpResult<Output> {
    let doc = source.load()?;
    let indices = select_pages(pages, document::page_count(&doc))?;

    let rotated = pdf::rotate(&doc, &indices, direction)?;
    deliver(rotated, output_name("rotated_", &source.name), &SaveOptions::default())
}

/// Draw `config` over every page
#[instrument(skip_all, fields(source = %source.name))]
pub fn watermark(source: &SourceDocument, config: &WatermarkConfig) -> OpResult<Output> {
    let doc = source.load()?;

    let watermarked = pdf::apply_watermark(&doc, config)?;
    deliver(watermarked, output_name("watermarked_", &source.name), &SaveOptions::default())
}

/// Typeset plain text onto pages of size `page`
#[instrument(skip_all, fields(title = %spec.title))]
pub fn text_to_pdf(spec: &TextDocumentSpec, page: PageDimensions) -> OpResult<Output> {
    let doc = pdf::layout_text(spec, page)?;

    let title = spec.title.trim();
    let filename = title_filename(title);
    let options = SaveOptions {
        title: (!title.is_empty()).then(|| title.to_string()),
        ..Default::default()
    };
    deliver(doc, filename, &options)
}

/// `<title>.pdf` with path separators replaced, or `document.pdf` when nothing usable remains
fn title_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    if stem.trim_matches(|c: char| c == '.' || c.is_whitespace()).is_empty() {
        return "document.pdf".to_string();
    }
    format!("{}.pdf", stem)
}

/// One page per image, each image fitted and centered
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[ImageAsset], page: PageDimensions) -> OpResult<Output> {
    let doc = pdf::images_to_pdf(images, page)?;
    deliver(doc, IMAGES_FILENAME.to_string(), &SaveOptions::default())
}

/// Re-save `source` with unused objects dropped and every stream compressed
#[instrument(skip_all, fields(source = %source.name))]
pub fn compress(source: &SourceDocument) -> OpResult<(Output, CompressionReport)> {
    let mut doc = source.load()?;
    let removed_objects = compact(&mut doc);

    let output = deliver(doc, output_name("compressed_", &source.name), &SaveOptions::default())?;
    let report = CompressionReport {
        original_size: source.bytes.len(),
        compressed_size: output.bytes.len(),
        removed_objects,
    };
    Ok((output, report))
}

/// Page count, info fields and page geometry of `source`
pub fn inspect(source: &SourceDocument) -> OpResult<PdfMetadata> {
    let doc = source.load()?;
    Ok(pdf::extract_metadata(&doc)?)
}
