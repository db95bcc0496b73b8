//! Split a colour image into the panel's black and red planes.
//!
//! Every pixel is quantized to the exact palette white, black, red and routed
//! to at most one plane, so the two outputs never overlap.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::Deserialize;
use thiserror::Error;

use crate::frame::{Frame, Plane};

/// Palette order matters: on equal distance the lower index wins.
pub const PALETTE: [[u8; 3]; 3] = [[255, 255, 255], [0, 0, 0], [255, 0, 0]];

const INDEX_BLACK: usize = 1;
const INDEX_RED: usize = 2;

/// Luma below this is ink when reducing a pushed image to one plane.
pub const MONO_THRESHOLD: u8 = 128;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error("target dimensions must be positive, got {width}x{height}")]
    DimensionError { width: u32, height: u32 },
}

/// How quantization error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dither {
    /// Plain nearest-colour mapping.
    #[default]
    None,
    /// Floyd–Steinberg error diffusion, kinder to photos.
    FloydSteinberg,
}

impl fmt::Display for Dither {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dither::None => write!(f, "none"),
            Dither::FloydSteinberg => write!(f, "floyd-steinberg"),
        }
    }
}

impl FromStr for Dither {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Dither::None),
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Ok(Dither::FloydSteinberg),
            _ => Err(format!(
                "Invalid dither '{}'. Valid values: none, floyd-steinberg",
                s
            )),
        }
    }
}

/// Decode `source` and compose it at the given size without dithering.
pub fn compose(source: &[u8], width: u32, height: u32) -> Result<Frame, ComposeError> {
    check_dimensions(width, height)?;
    let img = image::load_from_memory(source)?;
    compose_image(&img, width, height, Dither::None)
}

/// Compose an image file from disk.
pub fn compose_file(
    path: &Path,
    width: u32,
    height: u32,
    dither: Dither,
) -> Result<Frame, ComposeError> {
    check_dimensions(width, height)?;
    let img = image::open(path)?;
    compose_image(&img, width, height, dither)
}

pub fn compose_image(
    img: &DynamicImage,
    width: u32,
    height: u32,
    dither: Dither,
) -> Result<Frame, ComposeError> {
    check_dimensions(width, height)?;
    let rgb = img
        .resize_exact(width, height, FilterType::CatmullRom)
        .to_rgb8();

    let indices: Vec<usize> = match dither {
        Dither::None => rgb.pixels().map(|p| nearest_index(widen(p))).collect(),
        Dither::FloydSteinberg => diffuse(&rgb),
    };

    let mut frame = Frame::blank(width, height);
    for (i, &index) in indices.iter().enumerate() {
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        match index {
            INDEX_BLACK => frame.black.set(x, y, true),
            INDEX_RED => frame.red.set(x, y, true),
            _ => {}
        }
    }
    Ok(frame)
}

/// Reduce an encoded image to a single black plane by luma threshold.
pub fn monochrome(source: &[u8], width: u32, height: u32) -> Result<Plane, ComposeError> {
    check_dimensions(width, height)?;
    let img = image::load_from_memory(source)?;
    Ok(monochrome_image(&img, width, height))
}

pub fn monochrome_image(img: &DynamicImage, width: u32, height: u32) -> Plane {
    let gray = img
        .resize_exact(width, height, FilterType::CatmullRom)
        .to_luma8();
    let mut plane = Plane::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] < MONO_THRESHOLD {
            plane.set(x, y, true);
        }
    }
    plane
}

/// Index into `PALETTE` of the colour closest to `rgb` (squared distance).
pub fn nearest_index(rgb: [i32; 3]) -> usize {
    let mut best = 0;
    let mut best_dist = i32::MAX;
    for (i, entry) in PALETTE.iter().enumerate() {
        let dist: i32 = (0..3)
            .map(|c| {
                let d = rgb[c] - entry[c] as i32;
                d * d
            })
            .sum();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

fn widen(p: &Rgb<u8>) -> [i32; 3] {
    [p.0[0] as i32, p.0[1] as i32, p.0[2] as i32]
}

fn diffuse(rgb: &RgbImage) -> Vec<usize> {
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut work: Vec<[i32; 3]> = rgb.pixels().map(widen).collect();
    let mut out = vec![0; w * h];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let old = work[i].map(|c| c.clamp(0, 255));
            let index = nearest_index(old);
            out[i] = index;

            let chosen = PALETTE[index];
            let err = [
                old[0] - chosen[0] as i32,
                old[1] - chosen[1] as i32,
                old[2] - chosen[2] as i32,
            ];
            let mut spread = |dx: isize, dy: usize, weight: i32| {
                let nx = x as isize + dx;
                let ny = y + dy;
                if nx < 0 || nx as usize >= w || ny >= h {
                    return;
                }
                let cell = &mut work[ny * w + nx as usize];
                for c in 0..3 {
                    cell[c] += err[c] * weight / 16;
                }
            };
            spread(1, 0, 7);
            spread(-1, 1, 3);
            spread(0, 1, 5);
            spread(1, 1, 1);
        }
    }
    out
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ComposeError> {
    if width == 0 || height == 0 {
        return Err(ComposeError::DimensionError { width, height });
    }
    Ok(())
}

/// Render a plane as a white-background grayscale image.
pub fn plane_to_image(plane: &Plane) -> GrayImage {
    GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
        Luma([if plane.get(x, y) { 0 } else { 255 }])
    })
}

/// Render both planes as the panel would show them.
pub fn frame_to_image(frame: &Frame) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if frame.red.get(x, y) {
            Rgb(PALETTE[INDEX_RED])
        } else if frame.black.get(x, y) {
            Rgb(PALETTE[INDEX_BLACK])
        } else {
            Rgb(PALETTE[0])
        }
    })
}

/// Write `black_layer.png` and `red_layer.png` into `dir`.
pub fn save_layers(frame: &Frame, dir: &Path) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(dir)?;
    plane_to_image(&frame.black).save(dir.join("black_layer.png"))?;
    plane_to_image(&frame.red).save(dir.join("red_layer.png"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;

    fn encode(img: RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    // Small LCG so the noise images are reproducible.
    fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut state = seed;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 56) as u8
            };
            Rgb([next(), next(), next()])
        })
    }

    #[test]
    fn test_nearest_index_and_ties() {
        assert_eq!(nearest_index([255, 255, 255]), 0);
        assert_eq!(nearest_index([10, 10, 10]), 1);
        assert_eq!(nearest_index([250, 5, 5]), 2);
        assert_eq!(nearest_index([127, 0, 0]), 1);
        assert_eq!(nearest_index([128, 0, 0]), 2);
        // Yellow is equidistant from white and red; white comes first.
        assert_eq!(nearest_index([255, 255, 0]), 0);
    }

    #[test]
    fn test_planes_never_overlap() {
        for seed in 1..6 {
            let img = DynamicImage::ImageRgb8(noise(37, 23, seed));
            for dither in [Dither::None, Dither::FloydSteinberg] {
                let frame = compose_image(&img, 37, 23, dither).unwrap();
                assert!(frame.is_exclusive(), "seed {} {:?}", seed, dither);
            }
        }
    }

    #[test]
    fn test_pure_colours_route_to_planes() {
        let img = RgbImage::from_fn(3, 1, |x, _| Rgb(PALETTE[x as usize]));
        let frame = compose(&encode(img), 3, 1).unwrap();
        assert!(!frame.black.get(0, 0) && !frame.red.get(0, 0));
        assert!(frame.black.get(1, 0) && !frame.red.get(1, 0));
        assert!(frame.red.get(2, 0) && !frame.black.get(2, 0));
    }

    #[test]
    fn test_resizes_to_target() {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let frame = compose(&encode(img), 16, 8).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
        assert_eq!(frame.black.ink_count(), 16 * 8);
        assert!(frame.red.is_blank());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            compose(b"definitely not an image", 10, 10),
            Err(ComposeError::InvalidImage(_))
        ));
        let png = encode(RgbImage::new(2, 2));
        assert!(matches!(
            compose(&png, 0, 10),
            Err(ComposeError::DimensionError { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_monochrome_threshold() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            }
        });
        let plane = monochrome(&encode(img), 2, 1).unwrap();
        assert!(plane.get(0, 0));
        assert!(!plane.get(1, 0));
    }

    #[test]
    fn test_save_layers() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = Frame::blank(8, 8);
        frame.red.set(1, 1, true);
        save_layers(&frame, dir.path()).unwrap();
        let red = image::open(dir.path().join("red_layer.png")).unwrap().to_luma8();
        assert_eq!(red.get_pixel(1, 1).0[0], 0);
        assert_eq!(red.get_pixel(0, 0).0[0], 255);
        assert!(dir.path().join("black_layer.png").exists());
    }

    #[test]
    fn test_dither_from_str() {
        assert_eq!("none".parse::<Dither>().unwrap(), Dither::None);
        assert_eq!("Floyd-Steinberg".parse::<Dither>().unwrap(), Dither::FloydSteinberg);
        assert!("ordered".parse::<Dither>().is_err());
        assert_eq!(Dither::FloydSteinberg.to_string(), "floyd-steinberg");
    }
}
