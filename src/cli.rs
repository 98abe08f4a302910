//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flashloader")]
#[command(author, version, about = "Streamed flash loader and local flash installer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device configuration file (TOML)
    #[arg(short, long, global = true, default_value = "flashloader.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the emulated device keeps its storage and flash
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Directory standing in for the removable storage
    #[arg(short, long)]
    pub storage: PathBuf,

    /// File standing in for the flash (created and filled with 0xFF if missing)
    #[arg(short, long)]
    pub image: PathBuf,
}

/// Serial port selection
#[derive(Args, Debug, Clone, Default)]
pub struct SerialArgs {
    /// Serial port device (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(short, long)]
    pub baud: Option<u32>,
}

/// Command to send to a device
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// Stream an image into flash and run it
    Prog,
    /// Stream a file onto the removable storage
    Save,
    /// Ask the device to refresh its file listing
    Ls,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the device side: receive commands and apply them
    Serve {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        serial: SerialArgs,

        /// Read commands from a capture file instead of a serial port
        #[arg(long, conflicts_with = "port", required_unless_present = "port")]
        input: Option<PathBuf>,
    },

    /// Copy an image from storage into flash
    Install {
        /// Name of the image file on the storage
        name: String,

        #[command(flatten)]
        device: DeviceArgs,

        /// Read back and compare every written chunk
        #[arg(long)]
        verify: bool,
    },

    /// Run the host side: encode a command and send it
    Send {
        /// Command to send
        #[arg(value_enum)]
        kind: SendKind,

        /// File to send (required for prog and save)
        #[arg(short, long, required_if_eq_any = [("kind", "prog"), ("kind", "save")])]
        file: Option<PathBuf>,

        /// Name to store the file under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        serial: SerialArgs,

        /// Write the encoded command to a file instead of a serial port
        #[arg(short, long, conflicts_with = "port", required_unless_present = "port")]
        output: Option<PathBuf>,
    },
}
