// CLI definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hidtool")]
#[command(author, version, about = "Inspect and talk to HID devices")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Handle policy config (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected HID interfaces
    #[command(visible_alias = "ls")]
    List,

    /// Show manufacturer, product and serial strings
    Info {
        #[command(flatten)]
        target: Target,

        /// Also fetch string descriptor at this index
        #[arg(long)]
        index: Option<i32>,
    },

    /// Read input reports
    Read {
        #[command(flatten)]
        target: Target,

        /// Number of reports to read
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Report buffer size
        #[arg(long, default_value_t = 64)]
        size: usize,

        /// Return immediately when no report is pending
        #[arg(long)]
        nonblocking: bool,
    },

    /// Write an output report (hex, first byte is the report ID)
    Write {
        #[command(flatten)]
        target: Target,

        #[arg(value_parser = parse_payload)]
        data: HexBytes,
    },

    /// Fetch a feature report
    GetFeature {
        #[command(flatten)]
        target: Target,

        /// Report ID
        #[arg(long, value_parser = parse_u8, default_value = "0")]
        report_id: u8,

        /// Report buffer size, including the report ID byte
        #[arg(long, default_value_t = 65)]
        size: usize,
    },

    /// Send a feature report (hex, first byte is the report ID)
    SendFeature {
        #[command(flatten)]
        target: Target,

        #[arg(value_parser = parse_payload)]
        data: HexBytes,
    },
}

/// Which device to open
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Vendor ID (hex)
    #[arg(long, value_parser = parse_u16, requires = "pid", conflicts_with = "path")]
    pub vid: Option<u16>,

    /// Product ID (hex)
    #[arg(long, value_parser = parse_u16, requires = "vid")]
    pub pid: Option<u16>,

    /// Serial number, used with --vid/--pid
    #[arg(long, requires = "vid")]
    pub serial: Option<String>,

    /// Platform device path (e.g. /dev/hidraw3)
    #[arg(long, required_unless_present = "vid")]
    pub path: Option<String>,
}

/// Report payload given on the command line as hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_u16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(strip_hex_prefix(s), 16).map_err(|e| format!("invalid hex id {s:?}: {e}"))
}

pub fn parse_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(strip_hex_prefix(s), 16).map_err(|e| format!("invalid hex byte {s:?}: {e}"))
}

/// Parse "00 01 ff", "0001ff" or "00:01:ff"
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = strip_hex_prefix(s)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&cleaned).map_err(|e| format!("invalid hex data {s:?}: {e}"))
}

pub fn parse_payload(s: &str) -> Result<HexBytes, String> {
    parse_hex_bytes(s).map(HexBytes)
}
