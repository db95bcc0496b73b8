mod compose;
mod config;
mod control;
mod coordinator;
mod diff;
mod dispatch;
mod event;
mod frame;
mod input;
mod page;
mod panel;
mod push;
mod render;
mod scheduler;
mod upload;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use config::{Cli, Command, Config};
use coordinator::Coordinator;
use dispatch::{Rebooter, REBOOT_GRACE};
use push::{FramePush, FrameSlot};
use render::DashboardRenderer;
use scheduler::Scheduler;
use upload::GalleryUpload;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let default_filter = if cli.command.is_some() { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = Config::load(&cli)?;
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Some(Command::Dump { device }) => {
            let Some(device) = device.or(config.input_device) else {
                eprintln!("Usage: inkboard dump <DEVICE>  (or set input_device in the config)");
                std::process::exit(1);
            };
            input::run_dump(&device)
        }
        Some(Command::Compose { input, out_dir }) => run_compose(&config, &input, &out_dir),
        Some(Command::Diff { old, new }) => run_diff(&config, &old, &new),
        None => run_daemon(config),
    }
}

fn run_compose(config: &Config, input: &Path, out_dir: &Path) -> Result<(), BoxError> {
    let frame = compose::compose_file(input, config.width, config.height, config.dither)?;
    compose::save_layers(&frame, out_dir)?;
    println!(
        "{} -> {} (black {} px, red {} px)",
        input.display(),
        out_dir.display(),
        frame.black.ink_count(),
        frame.red.ink_count()
    );
    Ok(())
}

fn run_diff(config: &Config, old: &Path, new: &Path) -> Result<(), BoxError> {
    let old = compose::monochrome(&std::fs::read(old)?, config.width, config.height)?;
    let new = compose::monochrome(&std::fs::read(new)?, config.width, config.height)?;
    match diff::diff_bbox(&old, &new)? {
        Some(rect) => println!("{}", rect),
        None => println!("no difference"),
    }
    Ok(())
}

fn run_daemon(config: Config) -> Result<(), BoxError> {
    let (page, mode) = config.initial_view();
    log::info!(
        "inkboard starting ({}x{}, {} {}, buttons={}, control={}, panel={})",
        config.width,
        config.height,
        page,
        mode,
        config
            .input_device
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "off".into()),
        config
            .control_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "off".into()),
        config
            .snapshot_dir
            .as_deref()
            .map(|p| format!("snapshot {}", p.display()))
            .unwrap_or_else(|| "mock".into()),
    );

    let coordinator = Coordinator::shared(page, mode);
    let slot = Arc::new(FrameSlot::new());
    let (events_tx, events_rx) = mpsc::channel();

    let rebooter = Arc::new(Rebooter::new(
        config.reboot_command.clone(),
        REBOOT_GRACE,
        coordinator.clone(),
    ));
    let _dispatcher = dispatch::spawn(events_rx, coordinator.clone(), rebooter);

    let _input = match config.input_device.clone() {
        Some(device) => Some(input::spawn(
            device,
            config.button_map(),
            config.gesture_timings(),
            events_tx.clone(),
        )),
        None => {
            log::warn!("No input device configured, buttons disabled");
            None
        }
    };

    if let Some(addr) = config.control_addr {
        match control::bind(addr) {
            Ok(listener) => {
                log::info!("[control] listening on {}", addr);
                let ctx = Arc::new(control::ControlContext {
                    coordinator: coordinator.clone(),
                    push: FramePush::new(coordinator.clone(), slot.clone(), config.width, config.height),
                    upload: GalleryUpload::new(
                        coordinator.clone(),
                        config.gallery_dir.clone(),
                        config.width,
                        config.height,
                        config.dither,
                    ),
                    events: events_tx.clone(),
                });
                control::spawn(listener, ctx);
            }
            Err(e) => log::error!("[control] cannot listen on {}: {}", addr, e),
        }
    }
    drop(events_tx);

    let panel = panel::open(config.snapshot_dir.clone(), config.width, config.height);
    let renderer = DashboardRenderer::new(
        config.width,
        config.height,
        config.gallery_dir.clone(),
        config.dither,
        slot.clone(),
    );
    let mut scheduler = Scheduler::new(
        panel,
        renderer,
        coordinator,
        slot,
        config.scheduler_timings(),
        config.width,
        config.height,
        Instant::now(),
    );

    let stop = AtomicBool::new(false);
    scheduler.run(&stop);
    Ok(())
}
