//! Command-line interface definitions and parsing

use bluemsg_radio::RadioBackend;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Radio backend: lan or bluez
    #[arg(long, global = true)]
    pub radio: Option<RadioBackend>,

    /// Name announced to other devices (LAN radio)
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Print app events as JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Interactive chat: listen, scan, connect and talk
    Chat,
    /// Scan once and list the devices found
    Scan {
        /// Scan window in seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Wait for an inbound connection, then chat
    Listen {
        /// Stay visible to scans while waiting
        #[arg(short, long)]
        discoverable: bool,
    },
    /// Connect to a device by address, then chat
    Connect {
        /// Peer address (`ip:port` on LAN, MAC on Bluetooth)
        address: String,
    },
    /// Two simulated devices chatting, no radio needed
    Demo,
    /// Print an example configuration file
    Config,
}
