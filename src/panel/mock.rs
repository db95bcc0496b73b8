use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use super::{window_len, Panel, PanelError};
use crate::frame::{Plane, Rect};

/// A recorded panel call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOp {
    Init,
    InitPart,
    Display { black_ink: usize, red_ink: usize },
    DisplayPartial { rect: Rect, len: usize },
    Sleep,
}

/// Most recent calls kept by a [`MockPanel`].
pub const OP_LOG_CAPACITY: usize = 256;

/// Logs every call and keeps the most recent ones. Used when no real panel
/// is available and by the scheduler tests, which keep a handle on the log.
#[derive(Debug, Clone)]
pub struct MockPanel {
    width: u32,
    height: u32,
    ops: Arc<Mutex<VecDeque<PanelOp>>>,
    fail_next: Arc<Mutex<usize>>,
}

impl MockPanel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Arc::new(Mutex::new(VecDeque::with_capacity(OP_LOG_CAPACITY))),
            fail_next: Arc::new(Mutex::new(0)),
        }
    }

    /// The retained calls, oldest first.
    pub fn ops(&self) -> Vec<PanelOp> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Make the next `n` calls fail with an I/O error.
    pub fn fail_next(&self, n: usize) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = n;
    }

    fn record(&self, op: PanelOp) -> Result<(), PanelError> {
        {
            let mut fail = self.fail_next.lock().unwrap_or_else(PoisonError::into_inner);
            if *fail > 0 {
                *fail -= 1;
                log::debug!("[mock] failing {:?}", op);
                return Err(PanelError::Io(std::io::Error::other("injected failure")));
            }
        }
        log::debug!("[mock] {:?}", op);
        let mut ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);
        if ops.len() == OP_LOG_CAPACITY {
            ops.pop_front();
        }
        ops.push_back(op);
        Ok(())
    }
}

impl Panel for MockPanel {
    fn init(&mut self) -> Result<(), PanelError> {
        self.record(PanelOp::Init)
    }

    fn init_part(&mut self) -> Result<(), PanelError> {
        self.record(PanelOp::InitPart)
    }

    fn display(&mut self, black: &Plane, red: &Plane) -> Result<(), PanelError> {
        if black.width() != self.width || black.height() != self.height || !black.same_size(red) {
            return Err(PanelError::Rejected {
                op: "display",
                reason: format!("expected {}x{} planes", self.width, self.height),
            });
        }
        self.record(PanelOp::Display {
            black_ink: black.ink_count(),
            red_ink: red.ink_count(),
        })
    }

    fn display_partial(&mut self, bytes: &[u8], rect: Rect) -> Result<(), PanelError> {
        if rect.is_empty() || rect.x2 > self.width || rect.y2 > self.height {
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
        self.record(PanelOp::DisplayPartial {
            rect,
            len: bytes.len(),
        })
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        self.record(PanelOp::Sleep)
    }
}
