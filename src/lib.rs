//! PDF Page Operations Library
//!
//! A library for structural operations on PDF pages.
//! This library provides functionality to:
//! - Parse page-range expressions such as `1,3-5` or `all`
//! - Merge documents and extract or rotate selected pages
//! - Overlay text and image watermarks on every page
//! - Typeset plain text onto pages with word wrapping and pagination
//! - Build documents from PNG/JPEG images, recompress and inspect documents
//!
//! The [`ops`] module is the caller-facing surface: every operation takes
//! source bytes and parameters and returns the output bytes with a suggested
//! filename, or a [`Failure`] naming what went wrong.
//!
//! # Example
//!
//! ```no_run
//! use pdf_pageops::ops::{self, SourceDocument};
//! use std::path::Path;
//!
//! let source = SourceDocument::read(Path::new("report.pdf")).expect("Failed to read");
//! let output = ops::extract(&source, "1,3-5").expect("Failed to extract");
//!
//! assert_eq!(output.filename, "extracted_report.pdf");
//! output.write_to(Path::new(&output.filename)).expect("Failed to write");
//! ```

pub mod error;
pub mod layout;
pub mod ops;
pub mod pdf;
pub mod range;

// Re-export commonly used items
pub use error::{Error, Failure, FailureKind, Result};
pub use range::{parse_page_range, select_pages};
