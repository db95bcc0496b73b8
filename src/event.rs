//! Logical input events produced by the buttons and the control socket.

use std::fmt;

use crate::page::Page;

/// What a resolved gesture (or a remote command) asks the coordinator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Short press on a page button.
    PageSelectRequested(Page),
    /// Long press on a page button.
    ModeCycleRequested(Page),
    /// Short press on the utility button: redraw now.
    RefreshRequested,
    /// Long press on the utility button: refetch timed content, then redraw.
    SyncRequested,
    /// Page 1 and page 3 held together.
    RebootRequested,
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::PageSelectRequested(page) => write!(f, "select {}", page),
            InputEvent::ModeCycleRequested(page) => write!(f, "cycle mode on {}", page),
            InputEvent::RefreshRequested => write!(f, "manual refresh"),
            InputEvent::SyncRequested => write!(f, "force sync"),
            InputEvent::RebootRequested => write!(f, "reboot"),
        }
    }
}
