use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use super::ConfigError;
use crate::compose::Dither;
use crate::frame::{PANEL_HEIGHT, PANEL_WIDTH};
use crate::input::DEFAULT_BUTTON_CODES;

const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:7070";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    pub input_device: Option<PathBuf>,
    #[serde(default = "default_button_codes")]
    pub button_codes: [u16; 4],
    /// `false` disables the control socket.
    #[serde(default = "default_true")]
    pub control: bool,
    #[serde(default = "default_control_addr")]
    pub control_addr: Option<SocketAddr>,
    pub snapshot_dir: Option<PathBuf>,
    pub gallery_dir: Option<PathBuf>,
    #[serde(default = "default_one")]
    pub page: u8,
    #[serde(default = "default_one")]
    pub mode: u8,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_ghost_clear_secs")]
    pub ghost_clear_secs: u64,
    #[serde(default = "default_slideshow_secs")]
    pub slideshow_secs: u64,
    #[serde(default = "default_content_refresh_secs")]
    pub content_refresh_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_combo_ms")]
    pub combo_ms: u64,
    pub reboot_command: Option<String>,
    #[serde(default)]
    pub dither: Dither,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            input_device: None,
            button_codes: default_button_codes(),
            control: default_true(),
            control_addr: default_control_addr(),
            snapshot_dir: None,
            gallery_dir: None,
            page: default_one(),
            mode: default_one(),
            tick_ms: default_tick_ms(),
            ghost_clear_secs: default_ghost_clear_secs(),
            slideshow_secs: default_slideshow_secs(),
            content_refresh_secs: default_content_refresh_secs(),
            debounce_ms: default_debounce_ms(),
            poll_ms: default_poll_ms(),
            long_press_ms: default_long_press_ms(),
            combo_ms: default_combo_ms(),
            reboot_command: None,
            dither: Dither::default(),
        }
    }
}

fn default_width() -> u32 {
    PANEL_WIDTH
}

fn default_height() -> u32 {
    PANEL_HEIGHT
}

fn default_button_codes() -> [u16; 4] {
    DEFAULT_BUTTON_CODES
}

fn default_control_addr() -> Option<SocketAddr> {
    DEFAULT_CONTROL_ADDR.parse().ok()
}

fn default_true() -> bool {
    true
}

fn default_one() -> u8 {
    1
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_ghost_clear_secs() -> u64 {
    3600
}

fn default_slideshow_secs() -> u64 {
    300
}

fn default_content_refresh_secs() -> u64 {
    900
}

fn default_debounce_ms() -> u64 {
    20
}

fn default_poll_ms() -> u64 {
    100
}

fn default_long_press_ms() -> u64 {
    3000
}

fn default_combo_ms() -> u64 {
    5000
}

/// Load an explicitly requested file. Missing or malformed is an error.
pub fn load_from_path(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// First default location that parses. Broken files are skipped with a warning.
pub fn load_from_default_paths() -> Option<FileConfig> {
    for path in default_config_paths() {
        if path.exists() {
            match load_from_path(&path) {
                Ok(config) => return Some(config),
                Err(e) => log::warn!("{}", e),
            }
        }
    }
    None
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("inkboard.toml"));

    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".config").join("inkboard.toml"));
    }

    paths
}
