//! Error types for the page-operations library

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the page-operations library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A page-range expression selected no pages
    #[error("No pages selected by \"{spec}\" (document has {total} pages); use e.g. 1,3-5 or all")]
    EmptySelection { spec: String, total: usize },

    /// Insufficient or invalid inputs for an operation
    #[error("{0}")]
    Precondition(String),

    /// The supplied bytes are not a loadable PDF
    #[error("Cannot load document: {0}")]
    MalformedSource(String),

    /// An image asset could not be embedded
    #[error("Unsupported image: {0}")]
    UnsupportedAsset(String),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No files matched pattern
    #[error("No files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Which failure category this error reports as at the operation boundary
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::EmptySelection { .. } => FailureKind::Parse,
            Error::Precondition(_) | Error::FileNotFound(_) | Error::NoFilesMatched(_) => {
                FailureKind::Precondition
            }
            Error::MalformedSource(_) => FailureKind::MalformedSource,
            Error::UnsupportedAsset(_) => FailureKind::UnsupportedAsset,
            Error::Pdf(_) | Error::Io(_) | Error::General(_) => FailureKind::Internal,
        }
    }
}

/// Failure categories reported to callers of [`crate::ops`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The page-range expression resolved to nothing; ask for a new one
    Parse,
    /// Not enough inputs, or an input outside its allowed range
    Precondition,
    /// A source document could not be loaded
    MalformedSource,
    /// A watermark or page image is not PNG/JPEG or does not decode
    UnsupportedAsset,
    /// Anything else that went wrong while building the output
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Parse => "parse",
            FailureKind::Precondition => "precondition",
            FailureKind::MalformedSource => "malformed source",
            FailureKind::UnsupportedAsset => "unsupported asset",
            FailureKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Structured failure returned by every operation in [`crate::ops`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} failure)", self.message, self.kind)
    }
}

impl std::error::Error for Failure {}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_is_parse_failure() {
        let failure = Failure::from(Error::EmptySelection {
            spec: "99".to_string(),
            total: 5,
        });
        assert_eq!(failure.kind, FailureKind::Parse);
        assert!(failure.message.contains("\"99\""));
        assert!(failure.message.contains("5 pages"));
    }

    #[test]
    fn test_kinds_are_distinct() {
        assert_eq!(Error::Precondition("x".into()).kind(), FailureKind::Precondition);
        assert_eq!(Error::MalformedSource("x".into()).kind(), FailureKind::MalformedSource);
        assert_eq!(Error::UnsupportedAsset("x".into()).kind(), FailureKind::UnsupportedAsset);
        assert_eq!(Error::General("x".into()).kind(), FailureKind::Internal);
    }

    #[test]
    fn test_failure_display_names_kind() {
        let failure = Failure::from(Error::UnsupportedAsset("image/gif".into()));
        assert_eq!(
            failure.to_string(),
            "Unsupported image: image/gif (unsupported asset failure)"
        );
    }
}
