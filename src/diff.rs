//! Bounding box of the pixels that differ between two planes.
//!
//! Only ever used on black planes. Partial refreshes never touch the red
//! plane.

use thiserror::Error;

use crate::frame::{Plane, Rect};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("plane dimensions differ: {old_width}x{old_height} vs {new_width}x{new_height}")]
    DimensionMismatch {
        old_width: u32,
        old_height: u32,
        new_width: u32,
        new_height: u32,
    },
}

/// Smallest rectangle holding every differing pixel, `x2`/`y2` exclusive,
/// or `None` when the planes are identical.
pub fn diff_bbox(old: &Plane, new: &Plane) -> Result<Option<Rect>, DiffError> {
    if !old.same_size(new) {
        return Err(DiffError::DimensionMismatch {
            old_width: old.width(),
            old_height: old.height(),
            new_width: new.width(),
            new_height: new.height(),
        });
    }
    if old.width() == 0 || old.height() == 0 {
        return Ok(None);
    }

    let stride = old.stride();
    let rows = old
        .as_bytes()
        .chunks_exact(stride)
        .zip(new.as_bytes().chunks_exact(stride));

    // Inclusive bounds while scanning.
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (y, (a, b)) in rows.enumerate() {
        let Some((first, last)) = row_span(a, b) else {
            continue;
        };
        let y = y as u32;
        bounds = Some(match bounds {
            None => (first, y, last, y),
            Some((x0, y0, x1, _)) => (x0.min(first), y0, x1.max(last), y),
        });
    }

    Ok(bounds.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 + 1, y1 + 1)))
}

/// First and last differing column in one row. Relies on padding bits being
/// zero in both planes.
fn row_span(a: &[u8], b: &[u8]) -> Option<(u32, u32)> {
    let mut span: Option<(u32, u32)> = None;
    for (i, (pa, pb)) in a.iter().zip(b).enumerate() {
        let d = pa ^ pb;
        if d == 0 {
            continue;
        }
        let base = i as u32 * 8;
        let lo = base + d.leading_zeros();
        let hi = base + 7 - d.trailing_zeros();
        span = Some(match span {
            None => (lo, hi),
            Some((first, _)) => (first, hi),
        });
    }
    span
}
