//! The panel driver seam. Only the scheduler thread holds a panel.

mod mock;
mod snapshot;

pub use mock::{MockPanel, PanelOp};
pub use snapshot::SnapshotPanel;

use std::path::PathBuf;

use thiserror::Error;

use crate::frame::{Plane, Rect};

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("panel not present")]
    Absent,
    #[error("panel rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

/// Operations of a two-colour e-paper driver. Every call blocks until the
/// hardware is done and none can be cancelled.
pub trait Panel {
    /// Wake the controller for a full flush.
    fn init(&mut self) -> Result<(), PanelError>;

    /// Wake the controller for a partial window update.
    fn init_part(&mut self) -> Result<(), PanelError>;

    /// Redraw both planes entirely.
    fn display(&mut self, black: &Plane, red: &Plane) -> Result<(), PanelError>;

    /// Redraw the black plane inside `rect`. `bytes` holds the window in
    /// panel byte order, rows padded to whole bytes, and `rect` uses
    /// absolute corners.
    fn display_partial(&mut self, bytes: &[u8], rect: Rect) -> Result<(), PanelError>;

    /// Put the controller into deep sleep.
    fn sleep(&mut self) -> Result<(), PanelError>;
}

impl<P: Panel + ?Sized> Panel for Box<P> {
    fn init(&mut self) -> Result<(), PanelError> {
        (**self).init()
    }

    fn init_part(&mut self) -> Result<(), PanelError> {
        (**self).init_part()
    }

    fn display(&mut self, black: &Plane, red: &Plane) -> Result<(), PanelError> {
        (**self).display(black, red)
    }

    fn display_partial(&mut self, bytes: &[u8], rect: Rect) -> Result<(), PanelError> {
        (**self).display_partial(bytes, rect)
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        (**self).sleep()
    }
}

/// Expected byte length of a partial window.
pub fn window_len(rect: Rect) -> usize {
    (rect.width() as usize).div_ceil(8) * rect.height() as usize
}

/// Open the configured panel. A failing emulator falls back to the mock so
/// the rest of the daemon keeps running.
pub fn open(snapshot_dir: Option<PathBuf>, width: u32, height: u32) -> Box<dyn Panel + Send> {
    let Some(dir) = snapshot_dir else {
        log::info!("[panel] no snapshot directory, using mock panel");
        return Box::new(MockPanel::new(width, height));
    };

    match SnapshotPanel::create(dir.clone(), width, height) {
        Ok(panel) => {
            log::info!("[panel] emulating {}x{} into {}", width, height, dir.display());
            Box::new(panel)
        }
        Err(e) => {
            log::error!("[panel] init failed ({}), degrading to mock panel", e);
            Box::new(MockPanel::new(width, height))
        }
    }
}
