//! Watermark overlays
//!
//! A watermark is text, an image, or both, drawn centered on top of every page
//! at a constant opacity. The page's own content is wrapped in `q`/`Q` before
//! the overlay is appended, so a transformation matrix the page leaves behind
//! cannot move the watermark.

use lopdf::Document;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::layout::fit_within;
use crate::pdf::canvas::{PageCanvas, Rgb};
use crate::pdf::document::{media_box, page_ids};
use crate::pdf::font::StandardFont;
use crate::pdf::image::{embed_image, ImageAsset};

/// How far the text baseline drops below the page center when an image is drawn too
const TEXT_OFFSET_WITH_IMAGE: f32 = 20.0;

/// Largest fraction of the page width and height an image watermark may cover
const IMAGE_PAGE_FRACTION: f32 = 0.5;

/// What to draw on each page
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    /// Text to draw; nothing is drawn when empty
    pub text: String,
    /// Text size in points
    pub font_size: f32,
    /// Opacity of both text and image, from 0 (invisible) to 1 (opaque)
    pub opacity: f32,
    /// Optional image drawn behind the text
    pub image: Option<ImageAsset>,
    pub font: StandardFont,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "CONFIDENTIAL".to_string(),
            font_size: 48.0,
            opacity: 0.2,
            image: None,
            font: StandardFont::Helvetica,
        }
    }
}

impl WatermarkConfig {
    fn validate(&self) -> Result<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(Error::Precondition(format!(
                "Font size must be greater than zero (got {})",
                self.font_size
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::Precondition(format!(
                "Opacity must be between 0 and 1 (got {})",
                self.opacity
            )));
        }
        Ok(())
    }
}

/// Copy `source` and draw the watermark on every page of the copy
///
/// Applying a watermark to an already watermarked document adds a second
/// overlay on top of the first.
#[instrument(skip_all, fields(text = %config.text, with_image = config.image.is_some()))]
pub fn apply_watermark(source: &Document, config: &WatermarkConfig) -> Result<Document> {
    config.validate()?;

    let mut doc = source.clone();

    let image = match &config.image {
        Some(asset) => Some(embed_image(&mut doc, asset)?),
        None => None,
    };
    let font = if config.text.is_empty() {
        None
    } else {
        Some(config.font.embed(&mut doc))
    };

    for page_id in page_ids(&doc) {
        let [x0, y0, x1, y1] = media_box(&doc, page_id);
        let (width, height) = (x1 - x0, y1 - y0);
        let mut canvas = PageCanvas::new(&doc, page_id);

        if let Some(image) = &image {
            let (w, h) = fit_within(
                image.width as f32,
                image.height as f32,
                width * IMAGE_PAGE_FRACTION,
                height * IMAGE_PAGE_FRACTION,
            );
            canvas.draw_image(
                image.id,
                x0 + (width - w) / 2.0,
                y0 + (height - h) / 2.0,
                w,
                h,
                config.opacity,
            );
        }

        if let Some(font) = &font {
            let text_width = font.text_width(&config.text, config.font_size);
            let offset = if image.is_some() { TEXT_OFFSET_WITH_IMAGE } else { 0.0 };
            canvas.draw_text(
                &config.text,
                x0 + (width - text_width) / 2.0,
                y0 + height / 2.0 - offset,
                config.font_size,
                font,
                Rgb::DARK_GRAY,
                config.opacity,
            );
        }

        canvas.finish(&mut doc, true)?;
        debug!(?page_id, "Watermark drawn");
    }

    info!("Watermark applied");
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{add_blank_page, create, page_id};
    use lopdf::content::Content;
    use lopdf::Object;

    fn two_pages() -> Document {
        let mut doc = create();
        add_blank_page(&mut doc, 600.0, 800.0).unwrap();
        add_blank_page(&mut doc, 400.0, 400.0).unwrap();
        doc
    }

    fn operators(doc: &Document, index: usize) -> Vec<String> {
        let content = doc.get_page_content(page_id(doc, index).unwrap()).unwrap();
        Content::decode(&content)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    fn text_positions(doc: &Document, index: usize) -> Vec<(f32, f32)> {
        let content = doc.get_page_content(page_id(doc, index).unwrap()).unwrap();
        Content::decode(&content)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "Td")
            .map(|op| (op.operands[0].as_float().unwrap(), op.operands[1].as_float().unwrap()))
            .collect()
    }

    fn image_placements(doc: &Document, index: usize) -> Vec<[f32; 6]> {
        let content = doc.get_page_content(page_id(doc, index).unwrap()).unwrap();
        Content::decode(&content)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "cm")
            .map(|op| {
                let mut matrix = [0.0; 6];
                for (slot, operand) in matrix.iter_mut().zip(&op.operands) {
                    *slot = operand.as_float().unwrap();
                }
                matrix
            })
            .collect()
    }

    fn wide_png(width: u32, height: u32) -> ImageAsset {
        let buffer: ::image::RgbImage = ::image::ImageBuffer::from_pixel(width, height, ::image::Rgb([0, 0, 0]));
        let mut bytes = Vec::new();
        ::image::DynamicImage::ImageRgb8(buffer)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ::image::ImageFormat::Png)
            .unwrap();
        ImageAsset::new(bytes, crate::pdf::image::ImageFormat::Png)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 0.01, "expected {}, got {}", expected, actual);
    }

    #[test]
    fn test_image_fits_half_the_page_and_is_centered() {
        let source = two_pages();
        let config = WatermarkConfig {
            text: String::new(),
            image: Some(wide_png(200, 100)),
            ..Default::default()
        };
        let out = apply_watermark(&source, &config).unwrap();

        // 600x800: min(300/200, 400/100) = 1.5
        let [w, b, c, h, x, y] = image_placements(&out, 0)[0];
        assert_close(w, 300.0);
        assert_close(h, 150.0);
        assert_close(b, 0.0);
        assert_close(c, 0.0);
        assert_close(x, (600.0 - 300.0) / 2.0);
        assert_close(y, (800.0 - 150.0) / 2.0);

        // 400x400: min(200/200, 200/100) = 1
        let [w, _, _, h, x, y] = image_placements(&out, 1)[0];
        assert_close(w, 200.0);
        assert_close(h, 100.0);
        assert_close(x, 100.0);
        assert_close(y, 150.0);
    }

    #[test]
    fn test_text_drops_below_center_with_image() {
        let source = two_pages();
        let text_only = WatermarkConfig {
            text: "DRAFT".to_string(),
            ..Default::default()
        };
        let with_image = WatermarkConfig {
            image: Some(wide_png(10, 40)),
            ..text_only.clone()
        };

        let plain = apply_watermark(&source, &text_only).unwrap();
        let (_, y) = text_positions(&plain, 0)[0];
        assert_close(y, 800.0 / 2.0);

        let out = apply_watermark(&source, &with_image).unwrap();
        let (_, y) = text_positions(&out, 0)[0];
        assert_close(y, 800.0 / 2.0 - TEXT_OFFSET_WITH_IMAGE);
        let (_, y) = text_positions(&out, 1)[0];
        assert_close(y, 400.0 / 2.0 - 20.0);

        // tall image on 400x400: min(200/10, 200/40) = 5
        let [w, _, _, h, x, y] = image_placements(&out, 1)[0];
        assert_close(w, 50.0);
        assert_close(h, 200.0);
        assert_close(x, 175.0);
        assert_close(y, 100.0);
    }

    #[test]
    fn test_default_config() {
        let config = WatermarkConfig::default();
        assert_eq!(config.text, "CONFIDENTIAL");
        assert_eq!(config.font_size, 48.0);
        assert_eq!(config.opacity, 0.2);
        assert!(config.image.is_none());
    }

    #[test]
    fn test_text_is_centered_on_every_page() {
        let source = two_pages();
        let config = WatermarkConfig {
            text: "DRAFT".to_string(),
            font_size: 20.0,
            ..Default::default()
        };
        let out = apply_watermark(&source, &config).unwrap();

        let text_width = StandardFont::Helvetica.text_width("DRAFT", 20.0);
        let (x, y) = text_positions(&out, 0)[0];
        assert!((x - (600.0 - text_width) / 2.0).abs() < 0.01);
        assert!((y - 400.0).abs() < 0.01);

        let (x, y) = text_positions(&out, 1)[0];
        assert!((x - (400.0 - text_width) / 2.0).abs() < 0.01);
        assert!((y - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_source_is_unchanged() {
        let source = two_pages();
        apply_watermark(&source, &WatermarkConfig::default()).unwrap();
        let first = source.get_dictionary(page_id(&source, 0).unwrap()).unwrap();
        assert!(!first.has(b"Contents"));
    }

    #[test]
    fn test_reapplying_stacks_overlays() {
        let source = two_pages();
        let config = WatermarkConfig::default();
        let once = apply_watermark(&source, &config).unwrap();
        let twice = apply_watermark(&once, &config).unwrap();

        let shown = |doc: &Document| operators(doc, 0).iter().filter(|op| *op == "Tj").count();
        assert_eq!(shown(&once), 1);
        assert_eq!(shown(&twice), 2);
    }

    #[test]
    fn test_opacity_uses_graphics_state() {
        let source = two_pages();
        let out = apply_watermark(&source, &WatermarkConfig::default()).unwrap();
        let page = out.get_dictionary(page_id(&out, 0).unwrap()).unwrap();
        let Ok(Object::Dictionary(resources)) = page.get(b"Resources") else {
            panic!("resources should be inline");
        };
        let Ok(Object::Dictionary(states)) = resources.get(b"ExtGState") else {
            panic!("missing ExtGState");
        };
        let (_, state) = states.iter().next().unwrap();
        let Object::Dictionary(state) = state else {
            panic!("graphics state should be a dictionary");
        };
        assert!((state.get(b"ca").unwrap().as_float().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_text_without_image_draws_nothing() {
        let source = two_pages();
        let config = WatermarkConfig {
            text: String::new(),
            ..Default::default()
        };
        let out = apply_watermark(&source, &config).unwrap();
        let first = out.get_dictionary(page_id(&out, 0).unwrap()).unwrap();
        assert!(!first.has(b"Contents"));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let source = two_pages();
        for config in [
            WatermarkConfig { opacity: 1.5, ..Default::default() },
            WatermarkConfig { opacity: f32::NAN, ..Default::default() },
            WatermarkConfig { font_size: 0.0, ..Default::default() },
        ] {
            assert!(matches!(
                apply_watermark(&source, &config),
                Err(Error::Precondition(_))
            ));
        }
    }

    #[test]
    fn test_media_box_origin_is_respected() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        doc.get_dictionary_mut(page).unwrap().set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(100),
                Object::Integer(200),
                Object::Integer(300),
                Object::Integer(400),
            ]),
        );
        let config = WatermarkConfig {
            text: "X".to_string(),
            font_size: 10.0,
            ..Default::default()
        };
        let out = apply_watermark(&doc, &config).unwrap();
        let (_, y) = text_positions(&out, 0)[0];
        assert!((y - 300.0).abs() < 0.01);
    }
}
