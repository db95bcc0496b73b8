//! Read button edges from a gpio-keys evdev node.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use evdevil::event::InputEvent;
use evdevil::Evdev;

use super::button::{Button, ButtonMap, SharedLevels};
use super::event::{describe, key_edge, Edge};

/// Turns key events into line levels and press edges.
pub struct ButtonReader {
    path: PathBuf,
    map: ButtonMap,
    levels: SharedLevels,
    edges: [Sender<Instant>; 4],
}

impl ButtonReader {
    pub fn new(path: PathBuf, map: ButtonMap, levels: SharedLevels, edges: [Sender<Instant>; 4]) -> Self {
        Self {
            path,
            map,
            levels,
            edges,
        }
    }

    /// Stream events until the device goes away.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let device = Evdev::open(&self.path)?;
        log::info!(
            "Reading buttons from {} ({})",
            self.path.display(),
            device.name().unwrap_or_else(|_| "unnamed".into())
        );

        let mut count: u64 = 0;
        for ev in device.raw_events() {
            let ev = ev?;
            if count == 0 {
                log::info!("Button events flowing");
            }
            count += 1;

            self.handle_event(&ev, Instant::now());
        }
        Err(format!("event stream of {} ended", self.path.display()).into())
    }

    /// Apply one event. Returns the button whose press edge was forwarded.
    pub fn handle_event(&self, ev: &InputEvent, at: Instant) -> Option<Button> {
        let (code, edge) = key_edge(ev)?;
        let button = self.map.button_for(code)?;

        match edge {
            Edge::Down => {
                self.levels.set(button, true);
                log::debug!("[{}] edge", button);
                if self.edges[button.index()].send(at).is_err() {
                    log::warn!("[{}] worker gone, edge dropped", button);
                }
                Some(button)
            }
            Edge::Up => {
                self.levels.set(button, false);
                None
            }
        }
    }
}

/// Print decoded events from `path` until interrupted.
pub fn run_dump(path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let device = Evdev::open(path)?;
    eprintln!(
        "Dumping button events from {} ({}) (Ctrl+C to stop):\n",
        path.display(),
        device.name().unwrap_or_else(|_| "unnamed".into())
    );

    for (n, ev) in device.raw_events().enumerate() {
        println!("{:6}  {}", n + 1, describe(&ev?));
    }
    Ok(())
}
