//! Page content. Decides what each view shows; the scheduler decides when.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::compose::{compose_file, Dither};
use crate::coordinator::View;
use crate::frame::{Frame, Plane, Rect};
use crate::page::Page;
use crate::push::SharedFrameSlot;

/// Clock window on Hub 1. Byte aligned.
pub const CLOCK_REGION_LARGE: Rect = Rect::new(40, 56, 200, 80);
/// Clock window in the Hub 2 header. Byte aligned.
pub const CLOCK_REGION_SMALL: Rect = Rect::new(672, 16, 784, 40);

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];
const POTD_STEM: &str = "potd";

/// Inputs a render needs besides the view.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub wall: DateTime<Local>,
    /// Refetch timed content before drawing.
    pub force_sync: bool,
}

impl RenderContext {
    pub fn new(wall: DateTime<Local>) -> Self {
        Self {
            wall,
            force_sync: false,
        }
    }
}

/// The minute string shown by the clock. A change means the clock needs redrawing.
pub fn clock_label(wall: &DateTime<Local>) -> String {
    wall.format("%I:%M %p").to_string()
}

pub trait ContentRenderer {
    /// Complete frame for `view`. Never fails: missing content is drawn as
    /// a "content unavailable" notice.
    fn render_page(&self, view: &View, ctx: &RenderContext) -> Frame;

    /// Fixed region holding the clock, for views that have one.
    fn clock_region(&self, view: &View) -> Option<Rect>;
}

pub struct DashboardRenderer {
    width: u32,
    height: u32,
    gallery_dir: Option<PathBuf>,
    dither: Dither,
    pushed: SharedFrameSlot,
}

impl DashboardRenderer {
    pub fn new(
        width: u32,
        height: u32,
        gallery_dir: Option<PathBuf>,
        dither: Dither,
        pushed: SharedFrameSlot,
    ) -> Self {
        Self {
            width,
            height,
            gallery_dir,
            dither,
            pushed,
        }
    }

    fn unavailable(&self, what: &str, reason: &str) -> Frame {
        let mut frame = Frame::blank(self.width, self.height);
        let mid = self.height as i32 / 2;
        centered(&mut frame.red, "Content unavailable", self.width, mid - 24, &FONT_10X20);
        centered(&mut frame.black, what, self.width, mid + 4, &FONT_10X20);
        centered(&mut frame.black, reason, self.width, mid + 32, &FONT_6X10);
        frame
    }

    fn header(&self, frame: &mut Frame, title: &str) {
        fill(&mut frame.red, Rect::new(0, 0, self.width, 8));
        text(&mut frame.black, title, Point::new(24, 20), &FONT_10X20);
    }

    fn clock(&self, plane: &mut Plane, region: Rect, wall: &DateTime<Local>) {
        let at = Point::new(region.x1 as i32, region.y1 as i32 + 2);
        text(plane, &clock_label(wall), at, &FONT_10X20);
    }

    fn hub(&self, view: &View, ctx: &RenderContext) -> Frame {
        let mut frame = Frame::blank(self.width, self.height);
        match view.mode.number() {
            1 => {
                self.header(&mut frame, "Home");
                self.clock(&mut frame.black, CLOCK_REGION_LARGE, &ctx.wall);
                let date = ctx.wall.format("%A %-d %B %Y").to_string();
                text(&mut frame.black, &date, Point::new(40, 96), &FONT_10X20);
            }
            2 => {
                self.header(&mut frame, "Weather");
                self.clock(&mut frame.black, CLOCK_REGION_SMALL, &ctx.wall);
                let note = if ctx.force_sync {
                    "Forecast refresh requested"
                } else {
                    "No forecast source configured"
                };
                text(&mut frame.black, note, Point::new(40, 96), &FONT_10X20);
            }
            _ => match self.pushed.get() {
                Some(plane) if plane.same_size(&frame.black) => frame.black = (*plane).clone(),
                Some(plane) => {
                    return self.unavailable(
                        "Pushed frame",
                        &format!("{}x{} does not fit the panel", plane.width(), plane.height()),
                    )
                }
                None => {
                    let mid = self.height as i32 / 2;
                    centered(&mut frame.black, "Waiting for a pushed frame", self.width, mid, &FONT_10X20);
                }
            },
        }
        frame
    }

    fn tasks(&self, view: &View, ctx: &RenderContext) -> Frame {
        let title = match view.mode.number() {
            1 => "Tasks",
            2 => "Agenda",
            _ => "Calendar",
        };
        let mut frame = Frame::blank(self.width, self.height);
        self.header(&mut frame, title);
        let date = ctx.wall.format("%a %-d %b").to_string();
        text(&mut frame.black, &date, Point::new(self.width as i32 - 160, 20), &FONT_10X20);
        text(&mut frame.black, "Nothing scheduled", Point::new(40, 96), &FONT_10X20);
        frame
    }

    fn gallery(&self, view: &View) -> Frame {
        let Some(dir) = self.gallery_dir.as_deref() else {
            return self.unavailable("Gallery", "no gallery directory configured");
        };

        let picked = match view.mode.number() {
            1 => latest_image(dir),
            2 => {
                let images = slideshow_images(dir);
                if images.is_empty() {
                    None
                } else {
                    Some(images[view.slide % images.len()].clone())
                }
            }
            _ => list_images(dir).into_iter().find(|p| is_potd(p)),
        };
        let Some(path) = picked else {
            return self.unavailable("Gallery", &format!("no images in {}", dir.display()));
        };

        match compose_file(&path, self.width, self.height, self.dither) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("[render] {}: {}", path.display(), e);
                self.unavailable("Gallery", &e.to_string())
            }
        }
    }

    fn rebooting(&self) -> Frame {
        let mut frame = Frame::blank(self.width, self.height);
        let mid = self.height / 2;
        fill(&mut frame.red, Rect::new(0, mid.saturating_sub(40), self.width, mid.saturating_sub(32)));
        centered(&mut frame.black, "Rebooting...", self.width, mid as i32 - 10, &FONT_10X20);
        fill(&mut frame.red, Rect::new(0, mid + 32, self.width, mid + 40));
        frame
    }
}

impl ContentRenderer for DashboardRenderer {
    fn render_page(&self, view: &View, ctx: &RenderContext) -> Frame {
        if view.rebooting {
            return self.rebooting();
        }
        match view.page {
            Page::Hub => self.hub(view, ctx),
            Page::Tasks => self.tasks(view, ctx),
            Page::Gallery => self.gallery(view),
        }
    }

    fn clock_region(&self, view: &View) -> Option<Rect> {
        if !view.has_clock() {
            return None;
        }
        match view.mode.number() {
            1 => Some(CLOCK_REGION_LARGE),
            _ => Some(CLOCK_REGION_SMALL),
        }
    }
}

fn never(e: Infallible) -> ! {
    match e {}
}

fn text(plane: &mut Plane, s: &str, at: Point, font: &'static MonoFont<'static>) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    Text::with_baseline(s, at, style, Baseline::Top)
        .draw(plane)
        .unwrap_or_else(|e| never(e));
}

fn centered(
    plane: &mut Plane,
    s: &str,
    width: u32,
    y: i32,
    font: &'static MonoFont<'static>,
) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Top)
        .build();
    Text::with_text_style(s, Point::new(width as i32 / 2, y), style, layout)
        .draw(plane)
        .unwrap_or_else(|e| never(e));
}

fn fill(plane: &mut Plane, rect: Rect) {
    Rectangle::new(
        Point::new(rect.x1 as i32, rect.y1 as i32),
        Size::new(rect.width(), rect.height()),
    )
    .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
    .draw(plane)
    .unwrap_or_else(|e| never(e));
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn is_potd(path: &Path) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some(POTD_STEM)
}

/// Image files in `dir`, sorted by name. Unreadable directories are empty.
pub fn list_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("[render] cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    images.sort();
    images
}

/// Uploaded photos cycled by the slideshow.
pub fn slideshow_images(dir: &Path) -> Vec<PathBuf> {
    list_images(dir).into_iter().filter(|p| !is_potd(p)).collect()
}

/// Most recently modified upload.
pub fn latest_image(dir: &Path) -> Option<PathBuf> {
    slideshow_images(dir)
        .into_iter()
        .filter_map(|p| {
            let modified = std::fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .max()
        .map(|(_, p)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_bbox;
    use crate::page::Mode;
    use crate::push::FrameSlot;
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;

    const W: u32 = 800;
    const H: u32 = 480;

    fn view(page: Page, mode: u8) -> View {
        View {
            page,
            mode: Mode::new(mode).unwrap(),
            rebooting: false,
            slide: 0,
        }
    }

    fn wall(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, h, m, 0).single().unwrap()
    }

    fn renderer(gallery: Option<PathBuf>) -> (DashboardRenderer, SharedFrameSlot) {
        let slot = Arc::new(FrameSlot::new());
        (DashboardRenderer::new(W, H, gallery, Dither::None, slot.clone()), slot)
    }

    fn ink_outside(plane: &Plane, rect: Rect) -> usize {
        let mut n = 0;
        for y in 0..plane.height() {
            for x in 0..plane.width() {
                if plane.get(x, y) && !rect.contains(x, y) {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn test_clock_label() {
        assert_eq!(clock_label(&wall(14, 5)), "02:05 PM");
        assert_eq!(clock_label(&wall(0, 0)), "12:00 AM");
    }

    #[test]
    fn test_clock_regions_are_byte_aligned() {
        for r in [CLOCK_REGION_LARGE, CLOCK_REGION_SMALL] {
            assert_eq!(r.align_to_bytes(W), r);
            assert!(r.x2 <= W && r.y2 <= H);
        }
    }

    #[test]
    fn test_clock_drawn_inside_its_region() {
        let (r, _) = renderer(None);
        for mode in [1, 2] {
            let v = view(Page::Hub, mode);
            let region = r.clock_region(&v).unwrap();
            let before = r.render_page(&v, &RenderContext::new(wall(10, 59))).black;
            let after = r.render_page(&v, &RenderContext::new(wall(11, 0))).black;
            let changed = diff_bbox(&before, &after).unwrap().unwrap();
            assert_eq!(changed.union(&region), region, "mode {}", mode);

            // The clock alone, drawn on an empty plane, stays inside the region.
            let mut alone = Plane::new(W, H);
            r.clock(&mut alone, region, &wall(10, 59));
            assert!(!alone.is_blank());
            assert_eq!(ink_outside(&alone, region), 0);
        }
    }

    #[test]
    fn test_no_clock_outside_clock_views() {
        let (r, _) = renderer(None);
        assert_eq!(r.clock_region(&view(Page::Hub, 3)), None);
        assert_eq!(r.clock_region(&view(Page::Tasks, 1)), None);
        let mut rebooting = view(Page::Hub, 1);
        rebooting.rebooting = true;
        assert_eq!(r.clock_region(&rebooting), None);
    }

    #[test]
    fn test_frames_are_exclusive() {
        let (r, _) = renderer(None);
        let ctx = RenderContext::new(wall(9, 30));
        for page in Page::ALL {
            for mode in 1..=3 {
                let frame = r.render_page(&view(page, mode), &ctx);
                assert!(frame.is_exclusive(), "{} mode {}", page, mode);
                assert_eq!((frame.width(), frame.height()), (W, H));
            }
        }
    }

    #[test]
    fn test_pushed_frame_shown_on_hub3() {
        let (r, slot) = renderer(None);
        let mut plane = Plane::new(W, H);
        plane.set(3, 4, true);
        slot.store(plane.clone());
        let frame = r.render_page(&view(Page::Hub, 3), &RenderContext::new(wall(9, 0)));
        assert_eq!(frame.black, plane);
        assert!(frame.red.is_blank());
    }

    #[test]
    fn test_slideshow_cycles_sorted_images() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let (r, _) = renderer(Some(dir.path().to_path_buf()));
        let ctx = RenderContext::new(wall(9, 0));
        let mut v = view(Page::Gallery, 2);
        let first = r.render_page(&v, &ctx);
        assert_eq!(first.black.ink_count(), (W * H) as usize);
        v.slide = 1;
        assert_eq!(r.render_page(&v, &ctx).red.ink_count(), (W * H) as usize);
        v.slide = 2;
        assert_eq!(r.render_page(&v, &ctx), first);
    }

    #[test]
    fn test_broken_image_renders_notice() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let (r, _) = renderer(Some(dir.path().to_path_buf()));
        let frame = r.render_page(&view(Page::Gallery, 1), &RenderContext::new(wall(9, 0)));
        assert!(!frame.red.is_blank());
        assert!(frame.black.ink_count() < (W * H) as usize / 10);
    }

    #[test]
    fn test_potd_kept_out_of_slideshow() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["potd.png", "x.png"] {
            RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
                .save(dir.path().join(name))
                .unwrap();
        }
        assert_eq!(slideshow_images(dir.path()), vec![dir.path().join("x.png")]);
        assert_eq!(latest_image(dir.path()), Some(dir.path().join("x.png")));
        assert_eq!(list_images(dir.path()).len(), 2);
    }
}
