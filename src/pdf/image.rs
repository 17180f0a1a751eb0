//! Raster images: decoding, embedding as image XObjects, and image-per-page documents

use std::str::FromStr;

use image::{DynamicImage, GenericImageView};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::layout::{fit_within, PageDimensions};
use crate::pdf::canvas::PageCanvas;
use crate::pdf::document::{add_blank_page, create};

/// Space kept free on each side of an image placed on its own page, in points
pub const IMAGE_PAGE_BORDER: f32 = 20.0;

/// Raster formats that can be embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Parse a declared format: a MIME type (`image/png`) or an extension (`jpg`)
    pub fn from_declared(declared: &str) -> Result<Self> {
        let declared = declared.trim().to_ascii_lowercase();
        let name = declared.strip_prefix("image/").unwrap_or(&declared);
        match name.trim_start_matches('.') {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            _ => Err(Error::UnsupportedAsset(format!(
                "'{}' (expected PNG or JPEG)",
                declared
            ))),
        }
    }

    fn decoder_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_declared(s)
    }
}

/// Image bytes together with the format they were declared as
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self { bytes, format }
    }

    /// Build an asset whose format is recognized from the bytes themselves
    pub fn sniff(bytes: Vec<u8>) -> Result<Self> {
        let format = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => ImageFormat::Png,
            Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
            Ok(other) => {
                return Err(Error::UnsupportedAsset(format!(
                    "{:?} data (expected PNG or JPEG)",
                    other
                )))
            }
            Err(_) => return Err(Error::UnsupportedAsset("unrecognized image data".to_string())),
        };
        Ok(Self { bytes, format })
    }

    fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format.decoder_format())
            .map_err(|err| Error::UnsupportedAsset(format!("cannot decode {:?} image: {}", self.format, err)))
    }
}

/// An image XObject added to a document, with its pixel size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

/// Decode `asset` and add it to `doc` as an RGB image XObject.
///
/// Transparency is kept as a soft mask. Pixel data is stored raw and left for
/// the document's stream compression.
#[instrument(skip_all, fields(format = ?asset.format, bytes_len = asset.bytes.len()))]
pub fn embed_image(doc: &mut Document, asset: &ImageAsset) -> Result<EmbeddedImage> {
    let decoded = asset.decode()?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedAsset("image has no pixels".to_string()));
    }

    let mut dict = image_dictionary(width, height, b"DeviceRGB");
    if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|pixel| pixel.0[3]).collect();
        let mask = Stream::new(image_dictionary(width, height, b"DeviceGray"), alpha);
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }

    let pixels = decoded.to_rgb8().into_raw();
    let id = doc.add_object(Stream::new(dict, pixels));

    debug!(width, height, "Image embedded");
    Ok(EmbeddedImage { id, width, height })
}

fn image_dictionary(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

/// Build a document with one page per image.
///
/// Each image is scaled, keeping its aspect ratio, to the largest size that
/// fits inside the page less [`IMAGE_PAGE_BORDER`] on every side, and centered.
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[ImageAsset], page: PageDimensions) -> Result<Document> {
    if images.is_empty() {
        return Err(Error::Precondition("Select at least one image".to_string()));
    }

    let page_width = page.width.pt();
    let page_height = page.height.pt();
    let mut doc = create();

    for asset in images {
        let image = embed_image(&mut doc, asset)?;
        let page_id = add_blank_page(&mut doc, page_width, page_height)?;

        let (width, height) = fit_within(
            image.width as f32,
            image.height as f32,
            page_width - 2.0 * IMAGE_PAGE_BORDER,
            page_height - 2.0 * IMAGE_PAGE_BORDER,
        );
        let mut canvas = PageCanvas::new(&doc, page_id);
        canvas.draw_image(
            image.id,
            (page_width - width) / 2.0,
            (page_height - height) / 2.0,
            width,
            height,
            1.0,
        );
        canvas.finish(&mut doc, false)?;
    }

    Ok(doc)
}
