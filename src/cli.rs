use std::path::PathBuf;

use clap::{Parser, Subcommand};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

#[derive(Debug, Parser, Clone)]
#[command(name = "rootclay")]
#[command(about = "Stream G-code to a serial clay or 3D printer")]
#[command(version, long_version = LONG_VERSION)]
pub struct Cli {
    /// Settings file (.toml or .json); defaults to the platform config path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print events as JSON lines instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List serial ports that look like printer controllers.
    Ports,

    /// Send manual commands outside of a stream.
    Send {
        #[command(flatten)]
        link: LinkArgs,

        /// Milliseconds to keep listening for replies after the last command.
        #[arg(long, default_value_t = 2000)]
        wait_ms: u64,

        /// Commands to send, in order.
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Stream a G-code file with ping-pong flow control.
    Stream {
        #[command(flatten)]
        link: LinkArgs,

        /// G-code file to stream.
        file: PathBuf,
    },
}

#[derive(Debug, clap::Args, Clone)]
pub struct LinkArgs {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3; falls back to the settings file.
    #[arg(long, short)]
    pub port: Option<String>,

    /// Baud rate; falls back to the settings file.
    #[arg(long, short)]
    pub baud: Option<u32>,
}
