use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::compose::Dither;
use crate::page::{Mode, Page};

#[derive(Parser)]
#[command(name = "inkboard")]
#[command(about = "Drive a black/red e-paper dashboard from buttons, a control socket and timers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Button input device (gpio-keys evdev node)
    #[arg(long, env = "INKBOARD_INPUT_DEVICE")]
    pub input_device: Option<PathBuf>,

    /// Address of the line-oriented control socket
    #[arg(long)]
    pub control_addr: Option<SocketAddr>,

    /// Do not open the control socket (overrides config file)
    #[arg(long)]
    pub no_control: bool,

    /// Emulate the panel, writing a PNG snapshot here after every update
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Directory holding gallery photos
    #[arg(long)]
    pub gallery_dir: Option<PathBuf>,

    /// Page shown at startup (1, 2, 3)
    #[arg(long, value_parser = clap::value_parser!(Page))]
    pub page: Option<Page>,

    /// Mode shown at startup (1, 2, 3)
    #[arg(long, value_parser = clap::value_parser!(Mode))]
    pub mode: Option<Mode>,

    /// Force a full refresh after this many seconds without one
    #[arg(long)]
    pub ghost_clear_secs: Option<u64>,

    /// Seconds per slideshow image
    #[arg(long)]
    pub slideshow_secs: Option<u64>,

    /// Gallery dithering (none, floyd-steinberg)
    #[arg(long, value_parser = clap::value_parser!(Dither))]
    pub dither: Option<Dither>,

    /// Shell command run after the reboot combo
    #[arg(long)]
    pub reboot_command: Option<String>,

    /// Path to config file
    #[arg(long, env = "INKBOARD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Dump raw button events for debugging
    Dump {
        /// Input device, defaults to the configured one
        device: Option<PathBuf>,
    },
    /// Split an image into black_layer.png and red_layer.png
    Compose {
        input: PathBuf,
        out_dir: PathBuf,
    },
    /// Print the bounding box of the differences between two images
    Diff {
        old: PathBuf,
        new: PathBuf,
    },
}
