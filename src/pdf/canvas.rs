//! Drawing text and images on top of a page
//!
//! A [`PageCanvas`] collects drawing operations for one page and, on
//! [`PageCanvas::finish`], appends them as a new content stream and registers
//! the fonts, images and graphics states they use in the page's resources.
//! Resource names are picked so they never collide with names the page
//! already uses, which lets overlays be stacked on the same page.

use std::collections::{BTreeMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::Result;
use crate::pdf::document::{inherited_attribute, resolve};
use crate::pdf::font::{encode_win_ansi, FontHandle};

/// Resource categories a canvas can add to
const FONT: &[u8] = b"Font";
const XOBJECT: &[u8] = b"XObject";
const EXT_G_STATE: &[u8] = b"ExtGState";

/// Device RGB colour, components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const DARK_GRAY: Rgb = Rgb(0.2, 0.2, 0.2);
}

/// Pending drawing operations for one page
pub struct PageCanvas {
    page_id: ObjectId,
    operations: Vec<Operation>,
    taken_names: HashSet<Vec<u8>>,
    /// category -> (resource name -> resource value)
    additions: BTreeMap<&'static [u8], Vec<(String, Object)>>,
    font_names: Vec<(ObjectId, String)>,
    image_names: Vec<(ObjectId, String)>,
    opacity_names: Vec<(u32, String)>,
}

impl PageCanvas {
    /// Start drawing on `page_id`
    pub fn new(doc: &Document, page_id: ObjectId) -> Self {
        Self {
            page_id,
            operations: Vec::new(),
            taken_names: existing_resource_names(doc, page_id),
            additions: BTreeMap::new(),
            font_names: Vec::new(),
            image_names: Vec::new(),
            opacity_names: Vec::new(),
        }
    }

    /// True when nothing has been drawn yet
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Draw a single line of text with its baseline starting at `(x, y)`
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, font: &FontHandle, color: Rgb, opacity: f32) {
        let font_name = self.font_name(font.id);
        let opacity_name = self.opacity_name(opacity);

        self.operations.push(Operation::new("q", vec![]));
        if let Some(name) = opacity_name {
            self.operations.push(Operation::new("gs", vec![name_object(&name)]));
        }
        self.operations.push(Operation::new(
            "rg",
            vec![Object::Real(color.0), Object::Real(color.1), Object::Real(color.2)],
        ));
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![name_object(&font_name), Object::Real(size)],
        ));
        self.operations.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Hexadecimal)],
        ));
        self.operations.push(Operation::new("ET", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Draw an image XObject into the rectangle with lower-left corner `(x, y)`
    pub fn draw_image(&mut self, image_id: ObjectId, x: f32, y: f32, width: f32, height: f32, opacity: f32) {
        let image_name = self.image_name(image_id);
        let opacity_name = self.opacity_name(opacity);

        self.operations.push(Operation::new("q", vec![]));
        if let Some(name) = opacity_name {
            self.operations.push(Operation::new("gs", vec![name_object(&name)]));
        }
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(width),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(height),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        self.operations.push(Operation::new("Do", vec![name_object(&image_name)]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Write the collected operations to the page.
    ///
    /// With `isolate_existing` the page's current content is wrapped in `q`/`Q`
    /// first, so transformations it leaves behind do not move the overlay.
    pub fn finish(self, doc: &mut Document, isolate_existing: bool) -> Result<()> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let content = Content {
            operations: self.operations,
        };
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let mut contents = page_contents(doc, self.page_id);
        if isolate_existing && !contents.is_empty() {
            let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            contents.insert(0, Object::Reference(save_id));
            contents.push(Object::Reference(restore_id));
        }
        contents.push(Object::Reference(overlay_id));

        let resources = merged_resources(doc, self.page_id, &self.additions);
        let page = doc.get_dictionary_mut(self.page_id)?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));

        Ok(())
    }

    fn font_name(&mut self, font_id: ObjectId) -> String {
        if let Some((_, name)) = self.font_names.iter().find(|(id, _)| *id == font_id) {
            return name.clone();
        }
        let name = self.register(FONT, "F", Object::Reference(font_id));
        self.font_names.push((font_id, name.clone()));
        name
    }

    fn image_name(&mut self, image_id: ObjectId) -> String {
        if let Some((_, name)) = self.image_names.iter().find(|(id, _)| *id == image_id) {
            return name.clone();
        }
        let name = self.register(XOBJECT, "Im", Object::Reference(image_id));
        self.image_names.push((image_id, name.clone()));
        name
    }

    /// Graphics state for a constant alpha; `None` when fully opaque
    fn opacity_name(&mut self, opacity: f32) -> Option<String> {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 {
            return None;
        }
        let key = opacity.to_bits();
        if let Some((_, name)) = self.opacity_names.iter().find(|(bits, _)| *bits == key) {
            return Some(name.clone());
        }

        let mut state = Dictionary::new();
        state.set("Type", Object::Name(b"ExtGState".to_vec()));
        state.set("ca", Object::Real(opacity));
        state.set("CA", Object::Real(opacity));
        let name = self.register(EXT_G_STATE, "GS", Object::Dictionary(state));
        self.opacity_names.push((key, name.clone()));
        Some(name)
    }

    /// Pick an unused resource name with `prefix` and queue the resource
    fn register(&mut self, category: &'static [u8], prefix: &str, value: Object) -> String {
        let name = (1..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|candidate| !self.taken_names.contains(candidate.as_bytes()))
            .unwrap_or_else(|| prefix.to_string());
        self.taken_names.insert(name.as_bytes().to_vec());
        self.additions
            .entry(category)
            .or_default()
            .push((name.clone(), value));
        name
    }
}

fn name_object(name: &str) -> Object {
    Object::Name(name.as_bytes().to_vec())
}

/// The page's `/Contents` as a flat list of references
fn page_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// The page's effective resources with every category dictionary made direct
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources").map(|value| resolve(doc, value)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    for category in [FONT, XOBJECT, EXT_G_STATE] {
        let direct = match resources.get(category) {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Dictionary(dict)) => Some(dict.clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(dict) = direct {
            resources.set(category.to_vec(), Object::Dictionary(dict));
        }
    }

    resources
}

/// Every resource name the page already uses, across all categories
fn existing_resource_names(doc: &Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let resources = effective_resources(doc, page_id);
    let mut names = HashSet::new();
    for (_, category) in resources.iter() {
        if let Object::Dictionary(entries) = resolve(doc, category) {
            names.extend(entries.iter().map(|(name, _)| name.clone()));
        }
    }
    names
}

/// Effective resources plus the canvas additions
fn merged_resources(
    doc: &Document,
    page_id: ObjectId,
    additions: &BTreeMap<&'static [u8], Vec<(String, Object)>>,
) -> Dictionary {
    let mut resources = effective_resources(doc, page_id);
    for (category, entries) in additions {
        let mut dict = match resources.get(category) {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            _ => Dictionary::new(),
        };
        for (name, value) in entries {
            dict.set(name.as_bytes().to_vec(), value.clone());
        }
        resources.set(category.to_vec(), Object::Dictionary(dict));
    }
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{add_blank_page, create};
    use crate::pdf::font::StandardFont;

    fn resource_names(doc: &Document, page_id: ObjectId, category: &[u8]) -> Vec<Vec<u8>> {
        let page = doc.get_dictionary(page_id).unwrap();
        let Ok(Object::Dictionary(resources)) = page.get(b"Resources") else {
            return Vec::new();
        };
        match resources.get(category) {
            Ok(Object::Dictionary(dict)) => dict.iter().map(|(name, _)| name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_finish_without_drawing_leaves_page_alone() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        let canvas = PageCanvas::new(&doc, page);
        assert!(canvas.is_empty());
        canvas.finish(&mut doc, true).unwrap();
        assert!(!doc.get_dictionary(page).unwrap().has(b"Contents"));
    }

    #[test]
    fn test_draw_text_registers_font_and_opacity() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        let font = StandardFont::Helvetica.embed(&mut doc);

        let mut canvas = PageCanvas::new(&doc, page);
        canvas.draw_text("hello", 10.0, 20.0, 12.0, &font, Rgb::BLACK, 0.5);
        canvas.draw_text("again", 10.0, 40.0, 12.0, &font, Rgb::BLACK, 0.5);
        canvas.finish(&mut doc, false).unwrap();

        assert_eq!(resource_names(&doc, page, b"Font"), vec![b"F1".to_vec()]);
        assert_eq!(resource_names(&doc, page, b"ExtGState"), vec![b"GS1".to_vec()]);

        let content = doc.get_page_content(page).unwrap();
        let decoded = Content::decode(&content).unwrap();
        let shown: Vec<&Operation> = decoded.operations.iter().filter(|op| op.operator == "Tj").collect();
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn test_opaque_drawing_needs_no_graphics_state() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        let font = StandardFont::Helvetica.embed(&mut doc);

        let mut canvas = PageCanvas::new(&doc, page);
        canvas.draw_text("solid", 0.0, 0.0, 10.0, &font, Rgb::BLACK, 1.0);
        canvas.finish(&mut doc, false).unwrap();

        assert!(resource_names(&doc, page, b"ExtGState").is_empty());
    }

    #[test]
    fn test_second_canvas_uses_fresh_names() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        let font = StandardFont::Helvetica.embed(&mut doc);

        for _ in 0..2 {
            let mut canvas = PageCanvas::new(&doc, page);
            canvas.draw_text("stacked", 0.0, 0.0, 10.0, &font, Rgb::DARK_GRAY, 0.2);
            canvas.finish(&mut doc, true).unwrap();
        }

        let mut fonts = resource_names(&doc, page, b"Font");
        fonts.sort();
        assert_eq!(fonts, vec![b"F1".to_vec(), b"F2".to_vec()]);
    }

    #[test]
    fn test_isolation_wraps_existing_content() {
        let mut doc = create();
        let page = add_blank_page(&mut doc, 100.0, 100.0).unwrap();
        let original = doc.add_object(Stream::new(Dictionary::new(), b"2 0 0 2 0 0 cm".to_vec()));
        doc.get_dictionary_mut(page)
            .unwrap()
            .set("Contents", Object::Reference(original));
        let font = StandardFont::Helvetica.embed(&mut doc);

        let mut canvas = PageCanvas::new(&doc, page);
        canvas.draw_text("top", 0.0, 0.0, 10.0, &font, Rgb::BLACK, 1.0);
        canvas.finish(&mut doc, true).unwrap();

        let contents = page_contents(&doc, page);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1], Object::Reference(original));

        let decoded = Content::decode(&doc.get_page_content(page).unwrap()).unwrap();
        let operators: Vec<&str> = decoded.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators[0], "q");
        assert_eq!(operators[1], "cm");
        assert_eq!(operators[2], "Q");
    }
}
