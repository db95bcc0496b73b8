mod button;
mod event;
mod gesture;
mod reader;

pub use button::{Button, ButtonLevels, ButtonMap, SharedLevels, DEFAULT_BUTTON_CODES};
pub use gesture::{classify, ComboLatch, Gesture, GestureTimings, GestureTracker};
pub use reader::{run_dump, ButtonReader};

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::event::InputEvent;

/// Delay before reopening the input device after an error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Handles for the reader and the four gesture workers.
pub struct InputThreads {
    pub reader: JoinHandle<()>,
    pub workers: Vec<JoinHandle<()>>,
}

/// Start one gesture worker per button plus the device reader feeding them.
pub fn spawn(
    device: std::path::PathBuf,
    map: ButtonMap,
    timings: GestureTimings,
    events: Sender<InputEvent>,
) -> InputThreads {
    let levels: SharedLevels = Arc::new(ButtonLevels::new());
    let latch = Arc::new(ComboLatch::new());

    let mut workers = Vec::with_capacity(Button::ALL.len());
    let edges: [Sender<Instant>; 4] = std::array::from_fn(|i| {
        let (tx, rx) = mpsc::channel();
        workers.push(spawn_worker(
            Button::ALL[i],
            rx,
            levels.clone(),
            latch.clone(),
            timings,
            events.clone(),
        ));
        tx
    });

    for button in Button::ALL {
        log::debug!("[buttons] {} on key code {}", button, map.code_of(button));
    }

    let reader_levels = levels.clone();
    let reader = thread::spawn(move || {
        let reader = ButtonReader::new(device, map, reader_levels.clone(), edges);
        loop {
            log::info!("[buttons] reader starting…");
            if let Err(e) = reader.run() {
                log::error!("[buttons] {}", e);
            }
            // Nothing is held while the device is gone.
            reader_levels.release_all();
            log::warn!("[buttons] device lost, reopening in {}s…", RECONNECT_DELAY.as_secs());
            thread::sleep(RECONNECT_DELAY);
        }
    });

    InputThreads { reader, workers }
}

pub fn spawn_worker(
    button: Button,
    edges: Receiver<Instant>,
    levels: SharedLevels,
    latch: Arc<ComboLatch>,
    timings: GestureTimings,
    events: Sender<InputEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || run_worker(button, edges, &levels, &latch, timings, &events))
}

fn run_worker(
    button: Button,
    edges: Receiver<Instant>,
    levels: &ButtonLevels,
    latch: &ComboLatch,
    timings: GestureTimings,
    events: &Sender<InputEvent>,
) {
    while let Ok(pressed_at) = edges.recv() {
        thread::sleep(timings.debounce);
        if !levels.is_pressed(button) {
            log::debug!("[{}] bounce discarded", button);
            continue;
        }

        let tracker = GestureTracker::begin(button, pressed_at, latch, timings);
        let gesture = loop {
            thread::sleep(timings.poll);
            if let Some(g) = tracker.poll(Instant::now(), levels, latch) {
                break g;
            }
        };

        // Edges that arrived mid-gesture were bounces of this press.
        let stale = edges.try_iter().count();
        if stale > 0 {
            log::debug!("[{}] dropped {} stale edges", button, stale);
        }

        log::info!("[{}] {:?}", button, gesture);
        if let Some(event) = classify(button, gesture) {
            if events.send(event).is_err() {
                log::warn!("[{}] event channel closed, worker exiting", button);
                return;
            }
        }
    }
}
