//! PDF manipulation module

pub mod canvas;
pub mod document;
pub mod font;
pub mod image;
pub mod metadata;
pub mod text;
pub mod watermark;
mod extract;
mod merge;
mod rotate;

// Re-export commonly used items
pub use document::{load, save, SaveOptions};
pub use extract::extract;
pub use font::StandardFont;
pub use self::image::{images_to_pdf, ImageAsset, ImageFormat};
pub use merge::merge;
pub use metadata::{extract_metadata, PageInfo, PdfMetadata};
pub use rotate::{rotate, RotationDirection};
pub use text::{layout_text, TextDocumentSpec};
pub use watermark::{apply_watermark, WatermarkConfig};
