//! The four front-panel buttons and their shared line levels.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::event::InputEvent;
use crate::page::Page;

/// Default evdev key codes from a gpio-keys overlay (KEY_1..KEY_4).
pub const DEFAULT_BUTTON_CODES: [u16; 4] = [2, 3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Page1,
    Page2,
    Page3,
    /// Manual refresh on short press, force sync on long press.
    Utility,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::Page1, Button::Page2, Button::Page3, Button::Utility];

    pub fn index(self) -> usize {
        match self {
            Button::Page1 => 0,
            Button::Page2 => 1,
            Button::Page3 => 2,
            Button::Utility => 3,
        }
    }

    pub fn page(self) -> Option<Page> {
        match self {
            Button::Page1 => Some(Page::Hub),
            Button::Page2 => Some(Page::Tasks),
            Button::Page3 => Some(Page::Gallery),
            Button::Utility => None,
        }
    }

    /// Page 1 and page 3 together form the reboot combo.
    pub fn is_combo_member(self) -> bool {
        matches!(self, Button::Page1 | Button::Page3)
    }

    pub fn short_press_event(self) -> InputEvent {
        match self.page() {
            Some(page) => InputEvent::PageSelectRequested(page),
            None => InputEvent::RefreshRequested,
        }
    }

    pub fn long_press_event(self) -> InputEvent {
        match self.page() {
            Some(page) => InputEvent::ModeCycleRequested(page),
            None => InputEvent::SyncRequested,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::Page1 => write!(f, "btn-page1"),
            Button::Page2 => write!(f, "btn-page2"),
            Button::Page3 => write!(f, "btn-page3"),
            Button::Utility => write!(f, "btn-utility"),
        }
    }
}

/// Key code for each button, indexed by `Button::index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap {
    codes: [u16; 4],
}

impl ButtonMap {
    pub fn new(codes: [u16; 4]) -> Self {
        Self { codes }
    }

    pub fn button_for(&self, code: u16) -> Option<Button> {
        Button::ALL.into_iter().find(|b| self.codes[b.index()] == code)
    }

    pub fn code_of(&self, button: Button) -> u16 {
        self.codes[button.index()]
    }
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self::new(DEFAULT_BUTTON_CODES)
    }
}

/// Current asserted/released level of every button line. Written by the
/// device reader, polled by the gesture workers.
#[derive(Debug, Default)]
pub struct ButtonLevels {
    pressed: [AtomicBool; 4],
}

pub type SharedLevels = Arc<ButtonLevels>;

impl ButtonLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, button: Button, pressed: bool) {
        self.pressed[button.index()].store(pressed, Ordering::Release);
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()].load(Ordering::Acquire)
    }

    pub fn combo_held(&self) -> bool {
        self.is_pressed(Button::Page1) && self.is_pressed(Button::Page3)
    }

    pub fn release_all(&self) {
        for b in Button::ALL {
            self.set(b, false);
        }
    }
}
