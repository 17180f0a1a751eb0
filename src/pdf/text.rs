//! Plain text to paginated PDF
//!
//! Layout is planned first, as a pure function of the text, the page size and
//! a width measure, and only then drawn. The plan is a list of pages, each a
//! list of positioned lines, which keeps the wrapping and page-break rules
//! testable without looking at content streams.

use lopdf::Document;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::layout::{content_area, Length, Margins, PageDimensions};
use crate::pdf::canvas::{PageCanvas, Rgb};
use crate::pdf::document::{add_blank_page, create};
use crate::pdf::font::StandardFont;

/// Margin on every side of a text page, in points
pub const TEXT_MARGIN: f32 = 48.0;

/// Baseline-to-baseline distance as a multiple of the font size
const LINE_HEIGHT_FACTOR: f32 = 1.4;

/// The title is set this many points larger than the body
const TITLE_SIZE_INCREASE: f32 = 6.0;

/// Space after the title, in body line heights
const TITLE_GAP_FACTOR: f32 = 1.6;

/// Input for a text document
#[derive(Debug, Clone)]
pub struct TextDocumentSpec {
    /// Heading on the first page; omitted when empty
    pub title: String,
    /// Body size in points
    pub font_size: f32,
    pub font: StandardFont,
    /// Body text, one entry per hard line break
    pub lines: Vec<String>,
}

impl Default for TextDocumentSpec {
    fn default() -> Self {
        Self {
            title: "Document".to_string(),
            font_size: 12.0,
            font: StandardFont::Helvetica,
            lines: Vec::new(),
        }
    }
}

impl TextDocumentSpec {
    /// Split raw text into lines at `\n`, dropping a trailing `\r` from each
    pub fn from_text(title: impl Into<String>, text: &str) -> Self {
        Self {
            title: title.into(),
            lines: text
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect(),
            ..Default::default()
        }
    }

    fn line_height(&self) -> f32 {
        self.font_size * LINE_HEIGHT_FACTOR
    }

    fn title_size(&self) -> f32 {
        self.font_size + TITLE_SIZE_INCREASE
    }
}

/// One line of text at its final position
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Baseline
    pub y: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    pub lines: Vec<PlacedLine>,
}

/// Result of planning a text document
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub page: PageDimensions,
    pub pages: Vec<LaidOutPage>,
}

impl TextLayout {
    /// Every placed line in reading order
    pub fn lines(&self) -> impl Iterator<Item = &PlacedLine> {
        self.pages.iter().flat_map(|page| page.lines.iter())
    }
}

/// Greedily wrap one line of text to `max_width`
///
/// Words are separated by whitespace. Words are added to the current line
/// while the line, measured at `size`, still fits; the first word that does
/// not fit starts the next line. A word wider than `max_width` on its own is
/// broken between characters. No returned line is wider than `max_width`
/// unless it is a single character. A line without words wraps to nothing.
pub fn wrap_line<F>(line: &str, max_width: f32, size: f32, measure: F) -> Vec<String>
where
    F: Fn(&str, f32) -> f32,
{
    let mut wrapped = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
        }
        if measure(word, size) <= max_width {
            current = word.to_string();
        } else {
            let mut pieces = break_word(word, max_width, size, &measure);
            // The tail of a broken word can still take following words
            current = pieces.pop().unwrap_or_default();
            wrapped.extend(pieces);
        }
    }

    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

fn break_word<F>(word: &str, max_width: f32, size: f32, measure: &F) -> Vec<String>
where
    F: Fn(&str, f32) -> f32,
{
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && measure(&piece, size) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Moves down the page and starts new pages
struct Cursor {
    pages: Vec<LaidOutPage>,
    left: f32,
    top: f32,
    bottom: f32,
    y: f32,
}

impl Cursor {
    fn new(left: f32, top: f32, bottom: f32) -> Self {
        Self {
            pages: vec![LaidOutPage::default()],
            left,
            top,
            bottom,
            y: top,
        }
    }

    /// Place a line at the cursor, on a new page if the cursor is below the margin
    fn place(&mut self, text: String, size: f32, advance: f32) {
        if self.y < self.bottom {
            self.pages.push(LaidOutPage::default());
            self.y = self.top;
        }
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(PlacedLine {
                text,
                x: self.left,
                y: self.y,
                size,
            });
        }
        self.y -= advance;
    }

    /// Leave an empty row; never starts a page on its own
    fn skip(&mut self, advance: f32) {
        if self.y >= self.bottom {
            self.y -= advance;
        }
    }
}

/// Plan the pages for `spec` on pages of size `page`
///
/// `measure(text, size)` gives the width of `text` at `size` points and must
/// not shrink as text is appended.
pub fn plan_text_layout<F>(spec: &TextDocumentSpec, page: PageDimensions, measure: F) -> Result<TextLayout>
where
    F: Fn(&str, f32) -> f32,
{
    if !spec.font_size.is_finite() || spec.font_size <= 0.0 {
        return Err(Error::Precondition(format!(
            "Font size must be greater than zero (got {})",
            spec.font_size
        )));
    }
    let area = content_area(&page, &Margins::uniform(Length::from_pt(TEXT_MARGIN)));
    if area.width() <= 0.0 || area.height() <= 0.0 {
        return Err(Error::Precondition(format!(
            "Page {}x{}pt is too small for {}pt margins",
            page.width.pt(),
            page.height.pt(),
            TEXT_MARGIN
        )));
    }

    let line_height = spec.line_height();
    let mut cursor = Cursor::new(area.left, area.top, area.bottom);

    if !spec.title.trim().is_empty() {
        let title_size = spec.title_size();
        let title_lines = wrap_line(&spec.title, area.width(), title_size, &measure);
        let count = title_lines.len();
        for (i, text) in title_lines.into_iter().enumerate() {
            let advance = if i + 1 == count {
                line_height * TITLE_GAP_FACTOR
            } else {
                title_size * LINE_HEIGHT_FACTOR
            };
            cursor.place(text, title_size, advance);
        }
    }

    for line in &spec.lines {
        let wrapped = wrap_line(line, area.width(), spec.font_size, &measure);
        if wrapped.is_empty() {
            cursor.skip(line_height);
            continue;
        }
        for text in wrapped {
            cursor.place(text, spec.font_size, line_height);
        }
    }

    Ok(TextLayout {
        page,
        pages: cursor.pages,
    })
}

/// Lay out `spec` on pages of size `page` and draw it into a new document
#[instrument(skip_all, fields(title = %spec.title, lines = spec.lines.len()))]
pub fn layout_text(spec: &TextDocumentSpec, page: PageDimensions) -> Result<Document> {
    let font = spec.font;
    let layout = plan_text_layout(spec, page, |text, size| font.text_width(text, size))?;

    let mut doc = create();
    let handle = font.embed(&mut doc);
    for (number, planned) in layout.pages.iter().enumerate() {
        let page_id = add_blank_page(&mut doc, page.width.pt(), page.height.pt())?;
        let mut canvas = PageCanvas::new(&doc, page_id);
        for line in &planned.lines {
            canvas.draw_text(&line.text, line.x, line.y, line.size, &handle, Rgb::BLACK, 1.0);
        }
        canvas.finish(&mut doc, false)?;
        debug!(page = number + 1, lines = planned.lines.len(), "Text page drawn");
    }

    info!(pages = layout.pages.len(), "Text laid out");
    Ok(doc)
}
