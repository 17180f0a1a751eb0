//! Page geometry: lengths, page sizes and margins
//!
//! PDF user space is measured in points (1/72 inch) with the origin at the
//! bottom-left corner of the page. Sizes are stored in points; millimetre and
//! inch constructors exist because paper sizes are usually quoted that way.

use std::str::FromStr;

use crate::error::Error;

/// Length in PDF points
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Length(pub f32);

impl Length {
    /// Create a length from points
    pub fn from_pt(pt: f32) -> Self {
        Length(pt)
    }

    /// Create a length from millimeters
    pub fn from_mm(mm: f32) -> Self {
        Length(mm * 72.0 / 25.4)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f32) -> Self {
        Length(inches * 72.0)
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f32 {
        self.0
    }

    /// Get the value in millimeters
    pub fn mm(&self) -> f32 {
        self.0 * 25.4 / 72.0
    }
}

/// Page dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: Length,
    pub height: Length,
}

impl PageDimensions {
    /// Page of an explicit size in points
    pub fn from_pt(width: f32, height: f32) -> Self {
        Self {
            width: Length::from_pt(width),
            height: Length::from_pt(height),
        }
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self::from_pt(612.0, 792.0)
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self::from_pt(595.28, 841.89)
    }
}

impl FromStr for PageDimensions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::a4()),
            "letter" => Ok(Self::letter()),
            other => Err(Error::Precondition(format!(
                "Unknown page size '{}' (expected a4 or letter)",
                other
            ))),
        }
    }
}

/// Margins for page content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
}

impl Margins {
    /// Create margins with same value on all sides
    pub fn uniform(margin: Length) -> Self {
        Self {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
        }
    }
}

/// Rectangle in page coordinates (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentArea {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl ContentArea {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// Calculate the area of a page left for content once margins are removed
///
/// The coordinate system has origin at bottom-left of the page.
pub fn content_area(page: &PageDimensions, margins: &Margins) -> ContentArea {
    ContentArea {
        left: margins.left.pt(),
        bottom: margins.bottom.pt(),
        right: page.width.pt() - margins.right.pt(),
        top: page.height.pt() - margins.top.pt(),
    }
}

/// Largest size with the aspect ratio of `width × height` that fits in `max_width × max_height`
pub fn fit_within(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    let scale = (max_width / width).min(max_height / height);
    (width * scale, height * scale)
}
