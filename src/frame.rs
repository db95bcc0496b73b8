//! Monochrome planes, two-plane frames and the rectangle used for partial updates.
//!
//! A `Plane` is packed MSB-first with each row padded to a whole byte. A set
//! bit means ink. Padding bits are always zero so planes can be compared and
//! diffed byte-wise.

use std::convert::Infallible;
use std::fmt;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

/// Native resolution of the 7.5" black/red panel.
pub const PANEL_WIDTH: u32 = 800;
pub const PANEL_HEIGHT: u32 = 480;

/// Axis-aligned region with absolute, exclusive `x2`/`y2` corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        Rect::new(
            self.x1.min(width),
            self.y1.min(height),
            self.x2.min(width),
            self.y2.min(height),
        )
    }

    /// Widen horizontally to byte boundaries. The panel addresses partial
    /// windows in whole bytes, so `x1` is rounded down and `x2` up.
    pub fn align_to_bytes(&self, width: u32) -> Rect {
        Rect::new(
            self.x1 / 8 * 8,
            self.y1,
            self.x2.div_ceil(8).saturating_mul(8).min(width),
            self.y2,
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A 1-bit pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Plane {
    width: u32,
    height: u32,
    stride: usize,
    bits: Vec<u8>,
}

impl Plane {
    /// A plane of the given size with every pixel at background.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).div_ceil(8);
        Self {
            width,
            height,
            stride,
            bits: vec![0; stride * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn same_size(&self, other: &Plane) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (idx, mask) = self.locate(x, y);
        self.bits[idx] & mask != 0
    }

    pub fn set(&mut self, x: u32, y: u32, ink: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (idx, mask) = self.locate(x, y);
        if ink {
            self.bits[idx] |= mask;
        } else {
            self.bits[idx] &= !mask;
        }
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let idx = y as usize * self.stride + x as usize / 8;
        (idx, 0x80 >> (x % 8))
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    pub fn ink_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_blank(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Whole plane in panel byte order: bit 1 = white, bit 0 = ink.
    pub fn to_panel_bytes(&self) -> Vec<u8> {
        self.bits.iter().map(|b| !b).collect()
    }

    /// Pixels inside `rect` in panel byte order, each row padded to a whole
    /// byte. `rect` is clamped to the plane first.
    pub fn crop_panel_bytes(&self, rect: Rect) -> Vec<u8> {
        let rect = rect.clamp_to(self.width, self.height);
        let row_bytes = (rect.width() as usize).div_ceil(8);
        let mut out = vec![0xFF; row_bytes * rect.height() as usize];

        for (row, y) in (rect.y1..rect.y2).enumerate() {
            for (col, x) in (rect.x1..rect.x2).enumerate() {
                if self.get(x, y) {
                    out[row * row_bytes + col / 8] &= !(0x80 >> (col % 8));
                }
            }
        }
        out
    }
}

impl fmt::Debug for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plane")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("ink", &self.ink_count())
            .finish()
    }
}

impl OriginDimensions for Plane {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Plane {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 {
                continue;
            }
            self.set(coord.x as u32, coord.y as u32, color.is_on());
        }
        Ok(())
    }
}

/// The pair of planes sent to the panel in a full flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub black: Plane,
    pub red: Plane,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            black: Plane::new(width, height),
            red: Plane::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.black.width()
    }

    pub fn height(&self) -> u32 {
        self.black.height()
    }

    /// True when no pixel carries ink in both planes.
    pub fn is_exclusive(&self) -> bool {
        self.black
            .as_bytes()
            .iter()
            .zip(self.red.as_bytes())
            .all(|(b, r)| b & r == 0)
    }

    /// Drop black ink wherever red ink is present. The panel cannot show
    /// both at one coordinate; red wins.
    pub fn settle(&mut self) {
        if !self.black.same_size(&self.red) {
            return;
        }
        for (b, r) in self.black.bits.iter_mut().zip(&self.red.bits) {
            *b &= !r;
        }
    }
}
