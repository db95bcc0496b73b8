//! Per-press gesture classification: short press, long press or the
//! two-button reboot combo.
//!
//! A tracker is started once a press survives debounce and is polled while
//! the line stays asserted. Precedence is combo, then long press, then the
//! short press recorded at release. Every press resolves exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::event::InputEvent;

use super::button::{Button, ButtonLevels};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTimings {
    pub debounce: Duration,
    pub poll: Duration,
    pub long_press: Duration,
    pub combo: Duration,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(20),
            poll: Duration::from_millis(100),
            long_press: Duration::from_secs(3),
            combo: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ShortPress,
    LongPress,
    Combo,
    /// The other combo member already reported the combo.
    Absorbed,
}

/// Shared between the two combo buttons so only one of them reports the
/// combo. Each successful fire bumps the generation.
#[derive(Debug, Default)]
pub struct ComboLatch {
    generation: AtomicU64,
}

impl ComboLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn try_fire(&self, seen: u64) -> bool {
        self.generation
            .compare_exchange(seen, seen + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug)]
pub struct GestureTracker {
    button: Button,
    started: Instant,
    generation: u64,
    timings: GestureTimings,
}

impl GestureTracker {
    pub fn begin(button: Button, started: Instant, latch: &ComboLatch, timings: GestureTimings) -> Self {
        Self {
            button,
            started,
            generation: latch.generation(),
            timings,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    /// Inspect the lines at `now`. `None` means keep holding.
    pub fn poll(&self, now: Instant, levels: &ButtonLevels, latch: &ComboLatch) -> Option<Gesture> {
        let combo_member = self.button.is_combo_member();

        if combo_member && latch.generation() != self.generation {
            return Some(Gesture::Absorbed);
        }
        // A combo member let go before the combo completes counts as a short
        // press however long it was held.
        if !levels.is_pressed(self.button) {
            return Some(Gesture::ShortPress);
        }

        let held = now.saturating_duration_since(self.started);

        if combo_member && levels.combo_held() {
            if held < self.timings.combo {
                return None;
            }
            return Some(if latch.try_fire(self.generation) {
                Gesture::Combo
            } else {
                Gesture::Absorbed
            });
        }

        if held >= self.timings.long_press {
            return Some(Gesture::LongPress);
        }
        None
    }
}

/// Logical event for a resolved gesture.
pub fn classify(button: Button, gesture: Gesture) -> Option<InputEvent> {
    match gesture {
        Gesture::ShortPress => Some(button.short_press_event()),
        Gesture::LongPress => Some(button.long_press_event()),
        Gesture::Combo => Some(InputEvent::RebootRequested),
        Gesture::Absorbed => None,
    }
}
