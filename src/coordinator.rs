//! Shared display state and the pending refresh requests.
//!
//! Buttons, the control socket and the scheduler's timers only ever request
//! work here. The scheduler takes requests with take-and-reset operations
//! right before it talks to the panel, so a request arriving mid-flush stays
//! pending for the next tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event::InputEvent;
use crate::frame::Rect;
use crate::page::{Mode, Page};

/// What the panel should currently show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub page: Page,
    pub mode: Mode,
    pub rebooting: bool,
    pub slide: usize,
}

impl View {
    pub fn is(&self, page: Page, mode: u8) -> bool {
        self.page == page && self.mode.number() == mode
    }

    /// Hub 1 and 2 carry a minute clock that is patched in place.
    pub fn has_clock(&self) -> bool {
        !self.rebooting && (self.is(Page::Hub, 1) || self.is(Page::Hub, 2))
    }

    /// Hub 3 accepts pushed frames.
    pub fn accepts_push(&self) -> bool {
        self.is(Page::Hub, 3)
    }

    pub fn is_slideshow(&self) -> bool {
        self.is(Page::Gallery, 2)
    }

    /// Views whose content goes stale on its own (weather, tasks, picture of the day).
    pub fn has_timed_content(&self) -> bool {
        self.is(Page::Hub, 2) || self.page == Page::Tasks || self.is(Page::Gallery, 3)
    }
}

/// Snapshot of the pending request set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub full: bool,
    pub partial: Option<Rect>,
}

#[derive(Debug)]
struct State {
    page: Page,
    mode: Mode,
    rebooting: bool,
    slide: usize,
    full_requested: bool,
    partial: Option<Rect>,
    sync_requested: bool,
}

pub struct Coordinator {
    state: Mutex<State>,
}

pub type SharedCoordinator = Arc<Coordinator>;

impl Coordinator {
    /// Starts with a full refresh pending so the first tick draws the panel.
    pub fn new(page: Page, mode: Mode) -> Self {
        Self {
            state: Mutex::new(State {
                page,
                mode,
                rebooting: false,
                slide: 0,
                full_requested: true,
                partial: None,
                sync_requested: false,
            }),
        }
    }

    pub fn shared(page: Page, mode: Mode) -> SharedCoordinator {
        Arc::new(Self::new(page, mode))
    }

    // The state stays consistent across a panicking holder, every critical
    // section being plain assignments.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_full(&self) {
        self.lock().full_requested = true;
    }

    /// Replaces any region still pending.
    pub fn request_partial(&self, rect: Rect) {
        self.lock().partial = Some(rect);
    }

    /// Grow the pending region to also cover `rect`. Returns the merged region.
    pub fn merge_partial(&self, rect: Rect) -> Rect {
        let mut s = self.lock();
        let merged = match s.partial {
            Some(pending) => pending.union(&rect),
            None => rect,
        };
        s.partial = Some(merged);
        merged
    }

    pub fn current_page_mode(&self) -> (Page, Mode) {
        let s = self.lock();
        (s.page, s.mode)
    }

    pub fn set_page_mode(&self, page: Page, mode: Mode) {
        let mut s = self.lock();
        s.page = page;
        s.mode = mode;
        s.full_requested = true;
    }

    pub fn set_mode(&self, mode: Mode) {
        let mut s = self.lock();
        s.mode = mode;
        s.full_requested = true;
    }

    /// Short press: switch page, keep the mode.
    pub fn select_page(&self, page: Page) {
        let mut s = self.lock();
        s.page = page;
        s.full_requested = true;
    }

    /// Long press: enter `page` at mode 1, or advance the mode if already there.
    pub fn cycle_mode(&self, page: Page) -> Mode {
        let mut s = self.lock();
        if s.page != page {
            s.page = page;
            s.mode = Mode::FIRST;
        } else {
            s.mode = s.mode.next();
        }
        s.full_requested = true;
        s.mode
    }

    pub fn request_reboot(&self) {
        let mut s = self.lock();
        s.rebooting = true;
        s.full_requested = true;
    }

    /// Leave the rebooting state after a reboot that did not happen.
    pub fn cancel_reboot(&self) {
        let mut s = self.lock();
        s.rebooting = false;
        s.full_requested = true;
    }

    pub fn request_sync(&self) {
        let mut s = self.lock();
        s.sync_requested = true;
        s.full_requested = true;
    }

    pub fn advance_slide(&self) -> usize {
        let mut s = self.lock();
        s.slide = s.slide.wrapping_add(1);
        s.full_requested = true;
        s.slide
    }

    pub fn view(&self) -> View {
        let s = self.lock();
        View {
            page: s.page,
            mode: s.mode,
            rebooting: s.rebooting,
            slide: s.slide,
        }
    }

    pub fn pending(&self) -> Pending {
        let s = self.lock();
        Pending {
            full: s.full_requested,
            partial: s.partial,
        }
    }

    pub fn take_partial(&self) -> Option<Rect> {
        self.lock().partial.take()
    }

    pub fn take_full(&self) -> bool {
        std::mem::take(&mut self.lock().full_requested)
    }

    pub fn take_sync(&self) -> bool {
        std::mem::take(&mut self.lock().sync_requested)
    }

    /// Put a region back after a failed partial write, unless a newer one
    /// has arrived in the meantime.
    pub fn restore_partial(&self, rect: Rect) {
        let mut s = self.lock();
        if s.partial.is_none() {
            s.partial = Some(rect);
        }
    }

    /// Apply a logical input event. Every event invalidates the panel.
    pub fn apply(&self, event: InputEvent) {
        match event {
            InputEvent::PageSelectRequested(page) => self.select_page(page),
            InputEvent::ModeCycleRequested(page) => {
                let mode = self.cycle_mode(page);
                log::info!("{} now in {}", page, mode);
            }
            InputEvent::RefreshRequested => self.request_full(),
            InputEvent::SyncRequested => self.request_sync(),
            InputEvent::RebootRequested => self.request_reboot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(n: u8) -> Mode {
        Mode::new(n).unwrap()
    }

    fn idle() -> Coordinator {
        let c = Coordinator::new(Page::Hub, Mode::FIRST);
        assert!(c.take_full());
        c
    }

    #[test]
    fn test_starts_with_full_pending() {
        let c = Coordinator::new(Page::Tasks, mode(2));
        assert_eq!(c.pending(), Pending { full: true, partial: None });
        assert_eq!(c.current_page_mode(), (Page::Tasks, mode(2)));
    }

    #[test]
    fn test_request_full_is_idempotent_and_sticky() {
        let c = idle();
        c.request_full();
        c.request_full();
        assert!(c.pending().full);
        assert!(c.take_full());
        assert!(!c.take_full());
    }

    #[test]
    fn test_partial_last_writer_wins() {
        let c = idle();
        c.request_partial(Rect::new(0, 0, 8, 8));
        c.request_partial(Rect::new(16, 16, 24, 24));
        assert_eq!(c.take_partial(), Some(Rect::new(16, 16, 24, 24)));
        assert_eq!(c.take_partial(), None);
    }

    #[test]
    fn test_merge_partial_unions_with_pending() {
        let c = idle();
        assert_eq!(c.merge_partial(Rect::new(0, 0, 8, 8)), Rect::new(0, 0, 8, 8));
        assert_eq!(c.merge_partial(Rect::new(16, 16, 24, 24)), Rect::new(0, 0, 24, 24));
        assert_eq!(c.take_partial(), Some(Rect::new(0, 0, 24, 24)));
        assert_eq!(c.merge_partial(Rect::new(8, 0, 16, 8)), Rect::new(8, 0, 16, 8));
    }

    #[test]
    fn test_merge_partial_from_threads_loses_nothing() {
        let c = Arc::new(idle());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let c = c.clone();
                std::thread::spawn(move || {
                    c.merge_partial(Rect::new(i * 8, i, i * 8 + 8, i + 1));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.take_partial(), Some(Rect::new(0, 0, 64, 8)));
    }

    #[test]
    fn test_cancel_reboot_restores_normal_view() {
        let c = idle();
        c.apply(InputEvent::RebootRequested);
        c.take_full();
        c.apply(InputEvent::PageSelectRequested(Page::Hub));
        assert!(!c.view().has_clock());

        c.cancel_reboot();
        assert!(c.take_full());
        assert!(!c.view().rebooting);
        assert!(c.view().has_clock());
    }

    #[test]
    fn test_restore_partial_keeps_newer() {
        let c = idle();
        c.restore_partial(Rect::new(0, 0, 8, 8));
        assert_eq!(c.pending().partial, Some(Rect::new(0, 0, 8, 8)));
        c.request_partial(Rect::new(8, 8, 16, 16));
        c.restore_partial(Rect::new(0, 0, 8, 8));
        assert_eq!(c.take_partial(), Some(Rect::new(8, 8, 16, 16)));
    }

    #[test]
    fn test_cycle_mode() {
        let c = idle();
        assert_eq!(c.cycle_mode(Page::Hub), mode(2));
        assert_eq!(c.cycle_mode(Page::Hub), mode(3));
        assert_eq!(c.cycle_mode(Page::Hub), mode(1));
        assert_eq!(c.cycle_mode(Page::Gallery), mode(1));
        assert_eq!(c.current_page_mode(), (Page::Gallery, mode(1)));
        assert!(c.take_full());
    }

    #[test]
    fn test_events_imply_full() {
        let c = idle();
        c.set_mode(mode(3));
        c.apply(InputEvent::PageSelectRequested(Page::Tasks));
        assert_eq!(c.current_page_mode(), (Page::Tasks, mode(3)));
        assert!(c.take_full());

        c.apply(InputEvent::SyncRequested);
        assert!(c.take_full());
        assert!(c.take_sync());
        assert!(!c.take_sync());

        c.apply(InputEvent::RebootRequested);
        assert!(c.view().rebooting);
        assert!(c.take_full());
    }

    #[test]
    fn test_view_predicates() {
        let c = idle();
        assert!(c.view().has_clock());
        c.set_page_mode(Page::Hub, mode(3));
        let v = c.view();
        assert!(v.accepts_push() && !v.has_clock());
        c.set_page_mode(Page::Gallery, mode(2));
        assert!(c.view().is_slideshow());
        c.request_reboot();
        c.set_page_mode(Page::Hub, mode(1));
        assert!(!c.view().has_clock());
    }
}
