//! Standard PDF fonts: metrics, encoding and embedding
//!
//! Only the base-14 fonts are used, so nothing needs embedding beyond a font
//! dictionary naming the font. Text is written with `WinAnsiEncoding`, which
//! covers printable ASCII and Latin-1; other characters are replaced by `?`
//! both when measuring and when drawing, so measured widths always describe
//! what ends up on the page.

use std::str::FromStr;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::Error;

/// Character substituted for anything outside WinAnsiEncoding
const REPLACEMENT: u8 = b'?';

/// Helvetica advance widths for WinAnsi codes 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //  !"#$%&'()*+,-./
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :;<=>?@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [\]^_`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {|}~
];

/// Times-Roman advance widths for WinAnsi codes 32..=126, in 1/1000 em
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, //  !"#$%&'()*+,-./
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, // 0-9
    278, 278, 564, 564, 564, 444, 921, // :;<=>?@
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, // A-M
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, // N-Z
    333, 278, 333, 469, 500, 333, // [\]^_`
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, // a-m
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, // n-z
    480, 200, 480, 541, // {|}~
];

/// One of the standard PDF fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
}

impl StandardFont {
    /// PostScript name used for `/BaseFont`
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times-Roman",
        }
    }

    fn ascii_widths(&self) -> &'static [u16; 95] {
        match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::TimesRoman => &TIMES_ROMAN_WIDTHS,
        }
    }

    /// Width used for Latin-1 codes, where no table is kept
    fn latin1_width(&self) -> u16 {
        match self {
            StandardFont::Helvetica => 556,
            StandardFont::TimesRoman => 500,
        }
    }

    /// Advance width of one encoded byte, in 1/1000 em
    pub fn code_width(&self, code: u8) -> u16 {
        match code {
            32..=126 => self.ascii_widths()[(code - 32) as usize],
            _ => self.latin1_width(),
        }
    }

    /// Width of `text` drawn at `size` points
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = encode_win_ansi(text)
            .into_iter()
            .map(|code| self.code_width(code) as u32)
            .sum();
        units as f32 * size / 1000.0
    }

    /// Add a font dictionary for this font to `doc`
    pub fn embed(&self, doc: &mut Document) -> FontHandle {
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(self.base_font().as_bytes().to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        FontHandle {
            id: doc.add_object(Object::Dictionary(font)),
            font: *self,
        }
    }
}

/// A font dictionary added to a particular document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHandle {
    pub id: ObjectId,
    pub font: StandardFont,
}

impl FontHandle {
    /// Width of `text` drawn at `size` points
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.font.text_width(text, size)
    }
}

impl FromStr for StandardFont {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "sans" => Ok(StandardFont::Helvetica),
            "times" | "times-roman" | "serif" => Ok(StandardFont::TimesRoman),
            other => Err(Error::Precondition(format!(
                "Unknown font '{}' (expected helvetica or times)",
                other
            ))),
        }
    }
}

/// Encode text as WinAnsi bytes
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => REPLACEMENT,
        })
        .collect()
}
