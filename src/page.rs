//! Pages and their display modes.

use std::fmt;
use std::str::FromStr;

/// One of the three top-level pages, each bound to a physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    /// Clock, weather and the API push canvas.
    #[default]
    Hub,
    /// Tasks and agenda.
    Tasks,
    /// Uploaded photos and the slideshow.
    Gallery,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Hub, Page::Tasks, Page::Gallery];

    pub fn number(self) -> u8 {
        match self {
            Page::Hub => 1,
            Page::Tasks => 2,
            Page::Gallery => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Page::Hub),
            2 => Some(Page::Tasks),
            3 => Some(Page::Gallery),
            _ => None,
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.number())
    }
}

impl FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Page::from_number)
            .ok_or_else(|| format!("Invalid page '{}'. Valid values: 1, 2, 3", s))
    }
}

/// Display mode within a page, always in `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode(u8);

impl Mode {
    pub const FIRST: Mode = Mode(1);
    pub const LAST: u8 = 3;

    pub fn new(n: u8) -> Option<Self> {
        (1..=Self::LAST).contains(&n).then_some(Mode(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// 1 → 2 → 3 → 1.
    pub fn next(self) -> Self {
        Mode(self.0 % Self::LAST + 1)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::FIRST
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode {}", self.0)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Mode::new)
            .ok_or_else(|| format!("Invalid mode '{}'. Valid values: 1, 2, 3", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycles() {
        let m = Mode::FIRST;
        assert_eq!(m.next().number(), 2);
        assert_eq!(m.next().next().number(), 3);
        assert_eq!(m.next().next().next(), Mode::FIRST);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("2".parse::<Page>().unwrap(), Page::Tasks);
        assert_eq!(" 3 ".parse::<Mode>().unwrap().number(), 3);
        assert!("0".parse::<Page>().is_err());
        assert!("4".parse::<Mode>().is_err());
        assert!("x".parse::<Mode>().is_err());
    }
}
