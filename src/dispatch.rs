//! Applies logical input events to the coordinator, one at a time.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::coordinator::SharedCoordinator;
use crate::event::InputEvent;

/// Time for the rebooting banner to reach the panel before the command runs.
pub const REBOOT_GRACE: Duration = Duration::from_secs(5);

/// Runs the configured reboot command once, after a grace period. If no
/// reboot happens the display leaves the rebooting state again.
pub struct Rebooter {
    command: Option<String>,
    grace: Duration,
    coordinator: SharedCoordinator,
    scheduled: AtomicBool,
}

impl Rebooter {
    pub fn new(command: Option<String>, grace: Duration, coordinator: SharedCoordinator) -> Self {
        Self {
            command,
            grace,
            coordinator,
            scheduled: AtomicBool::new(false),
        }
    }

    /// Returns the worker thread, or `None` if a reboot is already underway.
    pub fn schedule(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            log::info!("[reboot] already scheduled");
            return None;
        }
        let this = Arc::clone(self);
        Some(thread::spawn(move || {
            thread::sleep(this.grace);
            if this.run_command() {
                return;
            }
            this.coordinator.cancel_reboot();
            this.scheduled.store(false, Ordering::Release);
            log::warn!("[reboot] no reboot happened, back to the dashboard");
        }))
    }

    /// True once the command reported success.
    fn run_command(&self) -> bool {
        let Some(command) = self.command.as_deref() else {
            log::warn!("[reboot] requested, but no reboot_command is configured");
            return false;
        };
        log::info!("[reboot] running `{}`", command);
        match Command::new("sh").arg("-c").arg(command).status() {
            Ok(status) if status.success() => {
                log::info!("[reboot] command finished");
                true
            }
            Ok(status) => {
                log::error!("[reboot] command exited with {}", status);
                false
            }
            Err(e) => {
                log::error!("[reboot] failed to run command: {}", e);
                false
            }
        }
    }
}

pub fn spawn(
    events: Receiver<InputEvent>,
    coordinator: SharedCoordinator,
    rebooter: Arc<Rebooter>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            log::info!("[dispatch] {}", event);
            coordinator.apply(event);
            if event == InputEvent::RebootRequested {
                rebooter.schedule();
            }
        }
        log::info!("[dispatch] event channel closed");
    })
}
