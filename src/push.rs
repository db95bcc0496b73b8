//! Externally pushed monochrome frames for the Hub 3 canvas.
//!
//! The stored frame is what the scheduler crops when it serves a partial
//! request, so it is always replaced before the request is raised.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::compose::{self, ComposeError};
use crate::coordinator::SharedCoordinator;
use crate::diff::{diff_bbox, DiffError};
use crate::frame::{Plane, Rect};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("pushes are only accepted on page 1 mode 3")]
    WrongView,
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// First frame: stored and drawn with a full flush.
    FullBaseline,
    /// Identical to the stored frame, nothing to do.
    Unchanged,
    /// Stored and drawn with a full flush on request.
    FullForced,
    /// Stored; the given region is pending.
    Partial(Rect),
}

/// The last accepted pushed frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    frame: Mutex<Option<Arc<Plane>>>,
}

pub type SharedFrameSlot = Arc<FrameSlot>;

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Plane>>> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<Arc<Plane>> {
        self.lock().clone()
    }

    pub fn store(&self, plane: Plane) {
        *self.lock() = Some(Arc::new(plane));
    }
}

pub struct FramePush {
    coordinator: SharedCoordinator,
    slot: SharedFrameSlot,
    width: u32,
    height: u32,
}

impl FramePush {
    pub fn new(coordinator: SharedCoordinator, slot: SharedFrameSlot, width: u32, height: u32) -> Self {
        Self {
            coordinator,
            slot,
            width,
            height,
        }
    }

    pub fn push_file(&self, path: &Path, force_full: bool) -> Result<PushOutcome, PushError> {
        let bytes = std::fs::read(path).map_err(|source| PushError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.push(&bytes, force_full)
    }

    /// Accept an encoded image for the push canvas.
    pub fn push(&self, bytes: &[u8], force_full: bool) -> Result<PushOutcome, PushError> {
        if !self.coordinator.view().accepts_push() {
            return Err(PushError::WrongView);
        }
        let new = compose::monochrome(bytes, self.width, self.height)?;

        // Held across compare and store so two pushes cannot interleave.
        let mut stored = self.slot.lock();
        let Some(old) = stored.as_ref() else {
            *stored = Some(Arc::new(new));
            drop(stored);
            self.coordinator.request_full();
            log::info!("[push] baseline stored");
            return Ok(PushOutcome::FullBaseline);
        };

        let Some(rect) = diff_bbox(old, &new)? else {
            log::debug!("[push] frame unchanged");
            return Ok(PushOutcome::Unchanged);
        };

        *stored = Some(Arc::new(new));
        drop(stored);

        if force_full {
            self.coordinator.request_full();
            log::info!("[push] full refresh forced, changed {}", rect);
            return Ok(PushOutcome::FullForced);
        }

        // An older region may still be waiting; the stored frame now covers both.
        let region = self.coordinator.merge_partial(rect);
        log::info!("[push] partial {}", region);
        Ok(PushOutcome::Partial(rect))
    }
}
