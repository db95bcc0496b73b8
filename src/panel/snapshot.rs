//! Host emulator: keeps the panel's framebuffer in memory and writes what
//! the glass would show to a PNG after every update.

use std::path::PathBuf;

use super::{window_len, Panel, PanelError};
use crate::compose::frame_to_image;
use crate::frame::{Frame, Plane, Rect};

pub const SNAPSHOT_FILE: &str = "panel.png";

pub struct SnapshotPanel {
    dir: PathBuf,
    frame: Frame,
    awake: bool,
    updates: u64,
}

impl SnapshotPanel {
    pub fn create(dir: PathBuf, width: u32, height: u32) -> Result<Self, PanelError> {
        std::fs::create_dir_all(&dir)?;
        if !dir.is_dir() {
            return Err(PanelError::Absent);
        }
        Ok(Self {
            dir,
            frame: Frame::blank(width, height),
            awake: false,
            updates: 0,
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn require_awake(&self, op: &'static str) -> Result<(), PanelError> {
        if self.awake {
            Ok(())
        } else {
            Err(PanelError::Rejected {
                op,
                reason: "controller asleep".into(),
            })
        }
    }

    fn write_snapshot(&mut self) -> Result<(), PanelError> {
        self.updates += 1;
        let path = self.snapshot_path();
        frame_to_image(&self.frame).save(&path).map_err(|e| match e {
            image::ImageError::IoError(io) => PanelError::Io(io),
            other => PanelError::Rejected {
                op: "snapshot",
                reason: other.to_string(),
            },
        })?;
        log::debug!("[snapshot] update {} written to {}", self.updates, path.display());
        Ok(())
    }
}

impl Panel for SnapshotPanel {
    fn init(&mut self) -> Result<(), PanelError> {
        self.awake = true;
        Ok(())
    }

    fn init_part(&mut self) -> Result<(), PanelError> {
        self.awake = true;
        Ok(())
    }

    fn display(&mut self, black: &Plane, red: &Plane) -> Result<(), PanelError> {
        self.require_awake("display")?;
        if !black.same_size(&self.frame.black) || !red.same_size(&self.frame.red) {
            return Err(PanelError::Rejected {
                op: "display",
                reason: format!("expected {}x{} planes", self.frame.width(), self.frame.height()),
            });
        }
        self.frame.black = black.clone();
        self.frame.red = red.clone();
        self.write_snapshot()
    }

    fn display_partial(&mut self, bytes: &[u8], rect: Rect) -> Result<(), PanelError> {
        self.require_awake("display_partial")?;
        if rect.is_empty() || rect.x2 > self.frame.width() || rect.y2 > self.frame.height() {
            return Err(PanelError::Rejected {
                op: "display_partial",
                reason: format!("window {} outside panel", rect),
            });
        }
        if bytes.len() != window_len(rect) {
            return Err(PanelError::Rejected {
                op: "display_partial",
                reason: format!("{} bytes for window {}", bytes.len(), rect),
            });
        }

        let row_bytes = (rect.width() as usize).div_ceil(8);
        for (row, y) in (rect.y1..rect.y2).enumerate() {
            for (col, x) in (rect.x1..rect.x2).enumerate() {
                let byte = bytes[row * row_bytes + col / 8];
                // Panel order: a cleared bit is ink.
                let ink = byte & (0x80 >> (col % 8)) == 0;
                self.frame.black.set(x, y, ink);
                // The red layer is untouched by partial windows.
            }
        }
        self.write_snapshot()
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        self.awake = false;
        Ok(())
    }
}
