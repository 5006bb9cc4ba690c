//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use mbed_flasher::flasher::FlashMethod;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mbed-flasher")]
#[command(author, version, about = "Flash mbed boards through their USB drive", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (JSON); built-in defaults apply without one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print flash reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash an image onto one board
    Flash {
        /// Image file to copy onto the board
        #[arg(short, long)]
        image: PathBuf,

        /// Target id reported by the board's interface firmware
        #[arg(short, long)]
        target_id: String,

        /// Where the board's drive is mounted
        #[arg(short, long)]
        mount_point: PathBuf,

        /// Serial port used for resets
        #[arg(short, long)]
        serial_port: Option<String>,

        /// How the image reaches the board
        #[arg(long, value_enum, default_value_t = MethodArg::DirectCopy)]
        method: MethodArg,

        /// Skip both serial resets
        #[arg(long)]
        no_reset: bool,
    },

    /// Flash one image onto several boards in parallel
    FlashMany {
        /// Image file to copy onto every board
        #[arg(short, long)]
        image: PathBuf,

        /// JSON array of target descriptors
        #[arg(short, long)]
        targets: PathBuf,

        /// Skip both serial resets
        #[arg(long)]
        no_reset: bool,
    },

    /// Reset a board by sending a break on its serial port
    Reset {
        /// Serial port of the board
        #[arg(short, long)]
        serial_port: String,
    },

    /// Settings file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show,

    /// Write a settings file holding the defaults
    Init {
        /// File to create
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Copy the image onto the board's drive
    DirectCopy,
    /// Program through an attached debug probe
    DebugProbe,
}

impl From<MethodArg> for FlashMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::DirectCopy => FlashMethod::DirectCopy,
            MethodArg::DebugProbe => FlashMethod::DebugProbe,
        }
    }
}
