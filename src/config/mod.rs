mod cli;
mod file;

pub use cli::{Cli, Command};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::compose::Dither;
use crate::input::{ButtonMap, GestureTimings};
use crate::page::{Mode, Page};
use crate::scheduler::SchedulerTimings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Merged configuration from CLI args and TOML file.
#[derive(Debug, Clone)]
pub struct Config {
    pub width: u32,
    pub height: u32,
    pub input_device: Option<PathBuf>,
    pub button_codes: [u16; 4],
    pub control_addr: Option<SocketAddr>,
    pub snapshot_dir: Option<PathBuf>,
    pub gallery_dir: Option<PathBuf>,
    pub page: u8,
    pub mode: u8,
    pub tick_ms: u64,
    pub ghost_clear_secs: u64,
    pub slideshow_secs: u64,
    pub content_refresh_secs: u64,
    pub debounce_ms: u64,
    pub poll_ms: u64,
    pub long_press_ms: u64,
    pub combo_ms: u64,
    pub reboot_command: Option<String>,
    pub dither: Dither,
}

impl Config {
    /// Load configuration by merging TOML file with CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file_config = match cli.config.as_ref() {
            Some(path) => file::load_from_path(path)?,
            None => file::load_from_default_paths().unwrap_or_default(),
        };

        Ok(Self {
            width: file_config.width,
            height: file_config.height,
            input_device: cli.input_device.clone().or(file_config.input_device),
            button_codes: file_config.button_codes,
            control_addr: match (cli.no_control, cli.control_addr) {
                (true, _) => None,
                (false, Some(addr)) => Some(addr),
                (false, None) if file_config.control => file_config.control_addr,
                (false, None) => None,
            },
            snapshot_dir: cli.snapshot_dir.clone().or(file_config.snapshot_dir),
            gallery_dir: cli.gallery_dir.clone().or(file_config.gallery_dir),
            page: cli.page.map(Page::number).unwrap_or(file_config.page),
            mode: cli.mode.map(Mode::number).unwrap_or(file_config.mode),
            tick_ms: file_config.tick_ms,
            ghost_clear_secs: cli.ghost_clear_secs.unwrap_or(file_config.ghost_clear_secs),
            slideshow_secs: cli.slideshow_secs.unwrap_or(file_config.slideshow_secs),
            content_refresh_secs: file_config.content_refresh_secs,
            debounce_ms: file_config.debounce_ms,
            poll_ms: file_config.poll_ms,
            long_press_ms: file_config.long_press_ms,
            combo_ms: file_config.combo_ms,
            reboot_command: cli.reboot_command.clone().or(file_config.reboot_command),
            dither: cli.dither.unwrap_or(file_config.dither),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("panel width and height must be positive"));
        }
        if Page::from_number(self.page).is_none() {
            return Err(ConfigError::Invalid("page must be 1, 2 or 3"));
        }
        if Mode::new(self.mode).is_none() {
            return Err(ConfigError::Invalid("mode must be 1, 2 or 3"));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive"));
        }
        if self.poll_ms == 0 {
            return Err(ConfigError::Invalid("poll_ms must be positive"));
        }
        if self.long_press_ms >= self.combo_ms {
            return Err(ConfigError::Invalid("long_press_ms must be shorter than combo_ms"));
        }
        Ok(())
    }

    /// Page and mode shown at startup.
    pub fn initial_view(&self) -> (Page, Mode) {
        (
            Page::from_number(self.page).unwrap_or_default(),
            Mode::new(self.mode).unwrap_or_default(),
        )
    }

    pub fn button_map(&self) -> ButtonMap {
        ButtonMap::new(self.button_codes)
    }

    pub fn gesture_timings(&self) -> GestureTimings {
        GestureTimings {
            debounce: Duration::from_millis(self.debounce_ms),
            poll: Duration::from_millis(self.poll_ms),
            long_press: Duration::from_millis(self.long_press_ms),
            combo: Duration::from_millis(self.combo_ms),
        }
    }

    pub fn scheduler_timings(&self) -> SchedulerTimings {
        SchedulerTimings {
            tick: Duration::from_millis(self.tick_ms),
            ghost_clear: Duration::from_secs(self.ghost_clear_secs),
            slideshow: Duration::from_secs(self.slideshow_secs),
            content_refresh: Duration::from_secs(self.content_refresh_secs),
        }
    }
}
