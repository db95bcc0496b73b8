//! The refresh loop. The only code that talks to the panel.
//!
//! Each tick picks at most one panel operation, in this order:
//! ghost clear (too long since the last full flush), pending push region,
//! requested full flush, clock patch, nothing. The periodic slideshow and
//! content timers run first and only ever request a full flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::coordinator::{SharedCoordinator, View};
use crate::frame::{Frame, Rect};
use crate::panel::{Panel, PanelError};
use crate::push::SharedFrameSlot;
use crate::render::{clock_label, ContentRenderer, RenderContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTimings {
    pub tick: Duration,
    /// A full flush is forced once more than this has passed since the last one.
    pub ghost_clear: Duration,
    pub slideshow: Duration,
    pub content_refresh: Duration,
}

impl Default for SchedulerTimings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            ghost_clear: Duration::from_secs(3600),
            slideshow: Duration::from_secs(300),
            content_refresh: Duration::from_secs(900),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Full,
    GhostClear,
    /// Pushed frame region, byte aligned.
    Partial(Rect),
    /// Clock region, byte aligned.
    Clock(Rect),
    /// A pending region could not be served and was discarded.
    Dropped,
    /// The panel call failed; the request stays pending.
    Failed,
}

/// Scheduler-local bookkeeping, never shared.
#[derive(Debug)]
struct Session {
    last_full: Instant,
    last_drawn_clock: String,
    last_slide_change: Instant,
    last_content_refresh: Instant,
}

pub struct Scheduler<P, R> {
    panel: P,
    renderer: R,
    coordinator: SharedCoordinator,
    pushed: SharedFrameSlot,
    timings: SchedulerTimings,
    width: u32,
    height: u32,
    session: Session,
}

impl<P: Panel, R: ContentRenderer> Scheduler<P, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        panel: P,
        renderer: R,
        coordinator: SharedCoordinator,
        pushed: SharedFrameSlot,
        timings: SchedulerTimings,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Self {
        Self {
            panel,
            renderer,
            coordinator,
            pushed,
            timings,
            width,
            height,
            session: Session {
                last_full: now,
                last_drawn_clock: String::new(),
                last_slide_change: now,
                last_content_refresh: now,
            },
        }
    }

    /// Tick every `timings.tick` until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!(
            "[scheduler] running (tick {}ms, ghost clear every {}s)",
            self.timings.tick.as_millis(),
            self.timings.ghost_clear.as_secs()
        );
        while !stop.load(Ordering::Relaxed) {
            self.tick(Instant::now(), Local::now());
            thread::sleep(self.timings.tick);
        }
        log::info!("[scheduler] stopped");
    }

    /// Evaluate one tick at monotonic time `now` and wall time `wall`.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Local>) -> TickOutcome {
        let view = self.coordinator.view();
        self.side_conditions(now, &view);

        let label = clock_label(&wall);

        if now.saturating_duration_since(self.session.last_full) > self.timings.ghost_clear {
            return self.full(now, wall, label, true);
        }
        if let Some(rect) = self.coordinator.take_partial() {
            return self.partial(&view, rect, label);
        }
        if self.coordinator.pending().full {
            return self.full(now, wall, label, false);
        }
        if let Some(region) = self.renderer.clock_region(&view) {
            if label != self.session.last_drawn_clock {
                return self.clock(&view, region, wall, label);
            }
        }
        TickOutcome::Idle
    }

    fn side_conditions(&mut self, now: Instant, view: &View) {
        if view.is_slideshow() && !view.rebooting {
            if now.saturating_duration_since(self.session.last_slide_change) >= self.timings.slideshow {
                let slide = self.coordinator.advance_slide();
                self.session.last_slide_change = now;
                log::info!("[scheduler] slideshow advanced to #{}", slide);
            }
        } else {
            self.session.last_slide_change = now;
        }

        if view.has_timed_content() && !view.rebooting {
            if now.saturating_duration_since(self.session.last_content_refresh)
                >= self.timings.content_refresh
            {
                self.coordinator.request_full();
                self.session.last_content_refresh = now;
                log::info!("[scheduler] timed content due on {} {}", view.page, view.mode);
            }
        } else {
            self.session.last_content_refresh = now;
        }
    }

    fn full(&mut self, now: Instant, wall: DateTime<Local>, label: String, ghost_clear: bool) -> TickOutcome {
        // Cleared before the panel call so a request arriving mid-flush survives.
        self.coordinator.take_full();
        let sync = self.coordinator.take_sync();
        let view = self.coordinator.view();

        let ctx = RenderContext {
            wall,
            force_sync: sync,
        };
        let mut frame = self.renderer.render_page(&view, &ctx);
        frame.settle();

        log::info!(
            "[scheduler] full refresh{} on {} {}",
            if ghost_clear { " (ghost clear)" } else { "" },
            view.page,
            view.mode
        );
        match self.flush_full(&frame) {
            Ok(()) => {
                self.session.last_full = now;
                self.session.last_content_refresh = now;
                self.session.last_drawn_clock = label;
                if ghost_clear {
                    TickOutcome::GhostClear
                } else {
                    TickOutcome::Full
                }
            }
            Err(e) => {
                log::error!("[scheduler] full refresh failed: {}", e);
                if sync {
                    self.coordinator.request_sync();
                }
                self.coordinator.request_full();
                TickOutcome::Failed
            }
        }
    }

    fn partial(&mut self, view: &View, rect: Rect, label: String) -> TickOutcome {
        if !view.accepts_push() {
            log::warn!("[scheduler] pushed region {} dropped, {} {} is showing", rect, view.page, view.mode);
            return TickOutcome::Dropped;
        }
        let Some(plane) = self.pushed.get() else {
            log::warn!("[scheduler] pushed region {} dropped, no stored frame", rect);
            return TickOutcome::Dropped;
        };

        let window = rect.clamp_to(self.width, self.height).align_to_bytes(self.width);
        if window.is_empty() {
            log::warn!("[scheduler] pushed region {} is outside the panel", rect);
            return TickOutcome::Dropped;
        }
        let bytes = plane.crop_panel_bytes(window);

        log::info!("[scheduler] partial refresh {}", window);
        match self.flush_partial(&bytes, window) {
            Ok(()) => {
                self.session.last_drawn_clock = label;
                TickOutcome::Partial(window)
            }
            Err(e) => {
                log::error!("[scheduler] partial refresh {} failed: {}", window, e);
                self.coordinator.restore_partial(rect);
                TickOutcome::Failed
            }
        }
    }

    fn clock(&mut self, view: &View, region: Rect, wall: DateTime<Local>, label: String) -> TickOutcome {
        let mut frame = self.renderer.render_page(view, &RenderContext::new(wall));
        frame.settle();

        let window = region.clamp_to(self.width, self.height).align_to_bytes(self.width);
        let bytes = frame.black.crop_panel_bytes(window);

        log::info!("[scheduler] clock {} in {}", label, window);
        match self.flush_partial(&bytes, window) {
            Ok(()) => {
                self.session.last_drawn_clock = label;
                TickOutcome::Clock(window)
            }
            Err(e) => {
                log::warn!("[scheduler] clock update failed: {}", e);
                TickOutcome::Failed
            }
        }
    }

    fn flush_full(&mut self, frame: &Frame) -> Result<(), PanelError> {
        self.panel.init()?;
        let shown = self.panel.display(&frame.black, &frame.red);
        let slept = self.panel.sleep();
        shown.and(slept)
    }

    fn flush_partial(&mut self, bytes: &[u8], window: Rect) -> Result<(), PanelError> {
        self.panel.init_part()?;
        let shown = self.panel.display_partial(bytes, window);
        let slept = self.panel.sleep();
        shown.and(slept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, Pending};
    use crate::frame::Plane;
    use crate::page::{Mode, Page};
    use crate::panel::{MockPanel, PanelOp};
    use crate::push::FrameSlot;
    use chrono::TimeZone;
    use std::sync::Arc;

    const W: u32 = 64;
    const H: u32 = 32;
    const CLOCK: Rect = Rect::new(8, 8, 24, 16);

    /// Draws the minute as ink in the clock region, plus one overlapping
    /// black/red pixel that must be settled before display.
    struct TestRenderer;

    impl ContentRenderer for TestRenderer {
        fn render_page(&self, view: &View, ctx: &RenderContext) -> Frame {
            let mut frame = Frame::blank(W, H);
            frame.black.set(0, 0, true);
            frame.red.set(0, 0, true);
            frame.black.set(40, 20, true);
            if view.has_clock() {
                let minute = ctx.wall.format("%M").to_string().parse::<u32>().unwrap_or(0);
                frame.black.set(CLOCK.x1 + minute % 16, CLOCK.y1, true);
            }
            frame
        }

        fn clock_region(&self, view: &View) -> Option<Rect> {
            view.has_clock().then_some(CLOCK)
        }
    }

    struct Rig {
        scheduler: Scheduler<MockPanel, TestRenderer>,
        panel: MockPanel,
        coordinator: SharedCoordinator,
        slot: SharedFrameSlot,
        t0: Instant,
    }

    fn rig(page: Page, mode: u8) -> Rig {
        let panel = MockPanel::new(W, H);
        let coordinator = Coordinator::shared(page, Mode::new(mode).unwrap());
        let slot = Arc::new(FrameSlot::new());
        let t0 = Instant::now();
        let scheduler = Scheduler::new(
            panel.clone(),
            TestRenderer,
            coordinator.clone(),
            slot.clone(),
            SchedulerTimings::default(),
            W,
            H,
            t0,
        );
        Rig {
            scheduler,
            panel,
            coordinator,
            slot,
            t0,
        }
    }

    fn wall(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, h, m, 0).single().unwrap()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn pushed_plane() -> Plane {
        let mut p = Plane::new(W, H);
        p.set(5, 3, true);
        p
    }

    #[test]
    fn test_first_tick_is_full_flush() {
        let mut r = rig(Page::Hub, 1);
        assert_eq!(r.scheduler.tick(r.t0, wall(9, 0)), TickOutcome::Full);
        assert_eq!(
            r.panel.ops(),
            vec![
                PanelOp::Init,
                PanelOp::Display {
                    black_ink: 2,
                    red_ink: 1
                },
                PanelOp::Sleep
            ]
        );
        assert_eq!(r.coordinator.pending(), Pending { full: false, partial: None });
        assert_eq!(r.scheduler.tick(r.t0 + secs(1), wall(9, 0)), TickOutcome::Idle);
    }

    #[test]
    fn test_partial_preempts_full() {
        let mut r = rig(Page::Hub, 3);
        r.slot.store(pushed_plane());
        r.coordinator.request_partial(Rect::new(5, 3, 6, 4));
        assert!(r.coordinator.pending().full);

        let outcome = r.scheduler.tick(r.t0, wall(9, 0));
        assert_eq!(outcome, TickOutcome::Partial(Rect::new(0, 3, 8, 4)));
        assert_eq!(r.coordinator.pending(), Pending { full: true, partial: None });
        assert_eq!(r.scheduler.tick(r.t0 + secs(1), wall(9, 0)), TickOutcome::Full);
    }

    #[test]
    fn test_partial_window_is_byte_aligned() {
        let mut r = rig(Page::Hub, 3);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.panel.clear();
        r.slot.store(pushed_plane());
        r.coordinator.request_partial(Rect::new(3, 2, 10, 5));
        r.scheduler.tick(r.t0 + secs(1), wall(9, 0));
        assert_eq!(
            r.panel.ops(),
            vec![
                PanelOp::InitPart,
                PanelOp::DisplayPartial {
                    rect: Rect::new(0, 2, 16, 5),
                    len: 6
                },
                PanelOp::Sleep
            ]
        );
    }

    #[test]
    fn test_ghost_clear_under_continuous_partials() {
        let mut r = rig(Page::Hub, 3);
        assert_eq!(r.scheduler.tick(r.t0, wall(9, 0)), TickOutcome::Full);
        r.slot.store(pushed_plane());

        for s in 1..=3600 {
            r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
            let outcome = r.scheduler.tick(r.t0 + secs(s), wall(9, 0));
            assert!(matches!(outcome, TickOutcome::Partial(_)), "second {}", s);
        }

        r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
        assert_eq!(r.scheduler.tick(r.t0 + secs(3601), wall(10, 0)), TickOutcome::GhostClear);
        // The region waits for the next tick.
        assert_eq!(r.coordinator.pending().partial, Some(Rect::new(0, 0, 8, 8)));
        assert!(matches!(
            r.scheduler.tick(r.t0 + secs(3602), wall(10, 0)),
            TickOutcome::Partial(_)
        ));
    }

    #[test]
    fn test_failed_full_is_retried() {
        let mut r = rig(Page::Tasks, 1);
        r.coordinator.request_sync();
        r.panel.fail_next(1);
        assert_eq!(r.scheduler.tick(r.t0, wall(9, 0)), TickOutcome::Failed);
        assert!(r.coordinator.pending().full);
        assert!(r.panel.ops().is_empty());

        assert_eq!(r.scheduler.tick(r.t0 + secs(1), wall(9, 0)), TickOutcome::Full);
        assert!(!r.coordinator.take_sync());
    }

    #[test]
    fn test_failed_full_keeps_ghost_deadline() {
        let mut r = rig(Page::Hub, 3);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.panel.fail_next(1);
        assert_eq!(r.scheduler.tick(r.t0 + secs(3601), wall(10, 0)), TickOutcome::Failed);
        assert_eq!(r.scheduler.tick(r.t0 + secs(3602), wall(10, 0)), TickOutcome::GhostClear);
    }

    #[test]
    fn test_failed_partial_restores_region() {
        let mut r = rig(Page::Hub, 3);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.slot.store(pushed_plane());
        r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
        r.panel.fail_next(1);
        assert_eq!(r.scheduler.tick(r.t0 + secs(1), wall(9, 0)), TickOutcome::Failed);
        assert_eq!(r.coordinator.pending().partial, Some(Rect::new(0, 0, 8, 8)));
    }

    /// Raises new requests from inside the panel calls, like a button press
    /// or a push landing while the panel is busy.
    struct BusyPanel {
        inner: MockPanel,
        coordinator: SharedCoordinator,
    }

    impl Panel for BusyPanel {
        fn init(&mut self) -> Result<(), PanelError> {
            self.inner.init()
        }

        fn init_part(&mut self) -> Result<(), PanelError> {
            self.inner.init_part()
        }

        fn display(&mut self, black: &Plane, red: &Plane) -> Result<(), PanelError> {
            self.coordinator.request_full();
            self.inner.display(black, red)
        }

        fn display_partial(&mut self, bytes: &[u8], rect: Rect) -> Result<(), PanelError> {
            self.coordinator.request_partial(Rect::new(16, 0, 24, 8));
            self.inner.display_partial(bytes, rect)
        }

        fn sleep(&mut self) -> Result<(), PanelError> {
            self.inner.sleep()
        }
    }

    #[test]
    fn test_requests_during_flush_survive() {
        let coordinator = Coordinator::shared(Page::Hub, Mode::new(3).unwrap());
        let slot = Arc::new(FrameSlot::new());
        let t0 = Instant::now();
        let panel = BusyPanel {
            inner: MockPanel::new(W, H),
            coordinator: coordinator.clone(),
        };
        let mut scheduler = Scheduler::new(
            panel,
            TestRenderer,
            coordinator.clone(),
            slot.clone(),
            SchedulerTimings::default(),
            W,
            H,
            t0,
        );

        assert_eq!(scheduler.tick(t0, wall(9, 0)), TickOutcome::Full);
        assert!(coordinator.pending().full);

        slot.store(pushed_plane());
        coordinator.request_partial(Rect::new(0, 0, 8, 8));
        assert_eq!(scheduler.tick(t0 + secs(1), wall(9, 0)), TickOutcome::Partial(Rect::new(0, 0, 8, 8)));
        assert_eq!(
            coordinator.pending(),
            Pending {
                full: true,
                partial: Some(Rect::new(16, 0, 24, 8))
            }
        );
        assert_eq!(scheduler.tick(t0 + secs(2), wall(9, 0)), TickOutcome::Partial(Rect::new(16, 0, 24, 8)));
    }

    #[test]
    fn test_failed_clock_retried_next_tick() {
        let mut r = rig(Page::Hub, 1);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.panel.fail_next(1);
        assert_eq!(r.scheduler.tick(r.t0 + secs(60), wall(9, 1)), TickOutcome::Failed);
        assert_eq!(r.scheduler.tick(r.t0 + secs(61), wall(9, 1)), TickOutcome::Clock(CLOCK));
        assert_eq!(r.scheduler.tick(r.t0 + secs(62), wall(9, 1)), TickOutcome::Idle);
    }

    #[test]
    fn test_partial_without_frame_or_view_is_dropped() {
        let mut r = rig(Page::Hub, 3);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
        assert_eq!(r.scheduler.tick(r.t0 + secs(1), wall(9, 0)), TickOutcome::Dropped);

        r.slot.store(pushed_plane());
        r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
        r.coordinator.select_page(Page::Gallery);
        assert_eq!(r.scheduler.tick(r.t0 + secs(2), wall(9, 0)), TickOutcome::Dropped);
        assert_eq!(r.coordinator.pending(), Pending { full: true, partial: None });
    }

    #[test]
    fn test_clock_patched_when_minute_changes() {
        let mut r = rig(Page::Hub, 1);
        r.scheduler.tick(r.t0, wall(9, 0));
        assert_eq!(r.scheduler.tick(r.t0 + secs(30), wall(9, 0)), TickOutcome::Idle);
        r.panel.clear();

        assert_eq!(r.scheduler.tick(r.t0 + secs(60), wall(9, 1)), TickOutcome::Clock(CLOCK));
        assert_eq!(
            r.panel.ops(),
            vec![
                PanelOp::InitPart,
                PanelOp::DisplayPartial { rect: CLOCK, len: 16 },
                PanelOp::Sleep
            ]
        );
        assert_eq!(r.scheduler.tick(r.t0 + secs(61), wall(9, 1)), TickOutcome::Idle);
    }

    #[test]
    fn test_no_clock_on_other_views() {
        let mut r = rig(Page::Tasks, 2);
        r.scheduler.tick(r.t0, wall(9, 0));
        assert_eq!(r.scheduler.tick(r.t0 + secs(60), wall(9, 1)), TickOutcome::Idle);
    }

    #[test]
    fn test_partial_marks_clock_drawn() {
        let mut r = rig(Page::Hub, 3);
        r.scheduler.tick(r.t0, wall(9, 0));
        r.slot.store(pushed_plane());
        r.coordinator.request_partial(Rect::new(0, 0, 8, 8));
        r.scheduler.tick(r.t0 + secs(60), wall(9, 1));
        r.coordinator.set_page_mode(Page::Hub, Mode::FIRST);
        r.coordinator.take_full();
        assert_eq!(r.scheduler.tick(r.t0 + secs(61), wall(9, 1)), TickOutcome::Idle);
    }

    #[test]
    fn test_slideshow_advances_on_interval() {
        let mut r = rig(Page::Gallery, 2);
        r.scheduler.tick(r.t0, wall(9, 0));
        assert_eq!(r.scheduler.tick(r.t0 + secs(299), wall(9, 4)), TickOutcome::Idle);
        assert_eq!(r.scheduler.tick(r.t0 + secs(300), wall(9, 5)), TickOutcome::Full);
        assert_eq!(r.coordinator.view().slide, 1);
        assert_eq!(r.scheduler.tick(r.t0 + secs(301), wall(9, 5)), TickOutcome::Idle);
    }

    #[test]
    fn test_timed_content_refreshes() {
        let mut r = rig(Page::Tasks, 1);
        r.scheduler.tick(r.t0, wall(9, 0));
        assert_eq!(r.scheduler.tick(r.t0 + secs(899), wall(9, 14)), TickOutcome::Idle);
        assert_eq!(r.scheduler.tick(r.t0 + secs(900), wall(9, 15)), TickOutcome::Full);
        assert_eq!(r.scheduler.tick(r.t0 + secs(901), wall(9, 15)), TickOutcome::Idle);
    }

    #[test]
    fn test_run_stops() {
        let mut r = rig(Page::Hub, 1);
        let stop = AtomicBool::new(true);
        r.scheduler.run(&stop);
        assert!(r.panel.ops().is_empty());
    }
}
