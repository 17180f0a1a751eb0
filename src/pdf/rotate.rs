//! Rotating pages by quarter turns

use std::str::FromStr;

use lopdf::Document;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::pdf::document::{copy_pages, create, page_count, rotation, set_rotation};

/// Which way to turn the selected pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    /// Signed angle added to the current rotation, in degrees
    pub fn delta(&self) -> i64 {
        match self {
            RotationDirection::Clockwise => 90,
            RotationDirection::CounterClockwise => -90,
        }
    }
}

impl FromStr for RotationDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cw" | "clockwise" | "right" => Ok(RotationDirection::Clockwise),
            "ccw" | "counterclockwise" | "counter-clockwise" | "left" => {
                Ok(RotationDirection::CounterClockwise)
            }
            other => Err(Error::Precondition(format!(
                "Unknown rotation direction '{}' (expected cw or ccw)",
                other
            ))),
        }
    }
}

/// Copy every page of `source` and turn the pages at `indices` a quarter turn
///
/// Rotation is additive: the new angle is the page's current angle plus
/// [`RotationDirection::delta`], normalized into `{0, 90, 180, 270}`. Pages not
/// selected keep their rotation.
#[instrument(skip_all, fields(pages = indices.len(), direction = ?direction))]
pub fn rotate(source: &Document, indices: &[usize], direction: RotationDirection) -> Result<Document> {
    if indices.is_empty() {
        return Err(Error::Precondition("No pages to rotate".to_string()));
    }
    let total = page_count(source);
    if let Some(&bad) = indices.iter().find(|&&index| index >= total) {
        return Err(Error::Precondition(format!(
            "Page index {} out of range (document has {} pages)",
            bad, total
        )));
    }

    let mut rotated = create();
    let all: Vec<usize> = (0..total).collect();
    let copies = copy_pages(source, &mut rotated, &all)?;

    for &index in indices {
        let page_id = copies[index];
        let current = rotation(&rotated, page_id);
        set_rotation(&mut rotated, page_id, current + direction.delta())?;
        debug!(page = index + 1, from = current, "Page rotated");
    }

    info!(pages = indices.len(), "Pages rotated");
    Ok(rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::{add_blank_page, page_id, page_ids};

    fn three_pages() -> Document {
        let mut doc = create();
        for _ in 0..3 {
            add_blank_page(&mut doc, 612.0, 792.0).unwrap();
        }
        doc
    }

    fn rotations(doc: &Document) -> Vec<i64> {
        page_ids(doc).into_iter().map(|id| rotation(doc, id)).collect()
    }

    #[test]
    fn test_rotate_selected_pages_only() {
        let source = three_pages();
        let out = rotate(&source, &[1], RotationDirection::Clockwise).unwrap();
        assert_eq!(rotations(&out), vec![0, 90, 0]);
        assert_eq!(rotations(&source), vec![0, 0, 0]);
    }

    #[test]
    fn test_rotation_is_additive() {
        let mut doc = three_pages();
        for expected in [90, 180, 270, 0] {
            doc = rotate(&doc, &[0], RotationDirection::Clockwise).unwrap();
            assert_eq!(rotation(&doc, page_id(&doc, 0).unwrap()), expected);
        }
    }

    #[test]
    fn test_counter_clockwise_wraps_below_zero() {
        let source = three_pages();
        let out = rotate(&source, &[0, 2], RotationDirection::CounterClockwise).unwrap();
        assert_eq!(rotations(&out), vec![270, 0, 270]);
    }

    #[test]
    fn test_rotate_keeps_existing_rotation() {
        let mut source = three_pages();
        let first = page_id(&source, 0).unwrap();
        set_rotation(&mut source, first, 180).unwrap();
        let out = rotate(&source, &[0], RotationDirection::Clockwise).unwrap();
        assert_eq!(rotations(&out), vec![270, 0, 0]);
    }

    #[test]
    fn test_rotate_rejects_bad_selection() {
        let source = three_pages();
        assert!(matches!(
            rotate(&source, &[], RotationDirection::Clockwise),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            rotate(&source, &[3], RotationDirection::Clockwise),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn test_direction_names() {
        assert_eq!("CCW".parse::<RotationDirection>().unwrap(), RotationDirection::CounterClockwise);
        assert_eq!("clockwise".parse::<RotationDirection>().unwrap().delta(), 90);
        assert!("up".parse::<RotationDirection>().is_err());
    }
}
