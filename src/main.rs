//! hidtool
//!
//! Command line access to HID devices through `DeviceHandle`.

mod cli;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use hid_handle::{DeviceHandle, HandleConfig, HidApiDevice, HidManager};
use tracing::{debug, info};

use cli::{Cli, Commands, Target};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            HandleConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => HandleConfig::default(),
    };
    debug!("Handle config: {:?}", config);

    let manager = HidManager::with_config(config)?;

    match cli.command {
        Commands::List => list(&manager),
        Commands::Info { target, index } => {
            let mut handle = open(&manager, &target)?;
            println!("Manufacturer: {}", handle.manufacturer_string()?);
            println!("Product:      {}", handle.product_string()?);
            println!("Serial:       {}", handle.serial_number_string()?);
            if let Some(index) = index {
                println!("String {:<7} {}", format!("{index}:"), handle.indexed_string(index)?);
            }
            handle.close()?;
        }
        Commands::Read {
            target,
            count,
            size,
            nonblocking,
        } => {
            let mut handle = open(&manager, &target)?;
            if nonblocking {
                handle.disable_blocking()?;
            } else {
                handle.enable_blocking()?;
            }
            let mut buf = vec![0u8; size];
            for _ in 0..count {
                let n = handle.read(&mut buf)?;
                if n == 0 {
                    println!("(no report pending)");
                } else {
                    println!("{}", hex_line(&buf[..n]));
                }
            }
            handle.close()?;
        }
        Commands::Write { target, data } => {
            let mut handle = open(&manager, &target)?;
            let written = handle.write(&data.0)?;
            println!("Wrote {}/{} bytes", written, data.0.len());
            handle.close()?;
        }
        Commands::GetFeature {
            target,
            report_id,
            size,
        } => {
            let mut handle = open(&manager, &target)?;
            let mut buf = vec![0u8; size.max(1)];
            buf[0] = report_id;
            let n = handle.get_feature_report(&mut buf)?;
            println!("{}", hex_line(&buf[..n]));
            handle.close()?;
        }
        Commands::SendFeature { target, data } => {
            let mut handle = open(&manager, &target)?;
            handle.send_feature_report(&data.0)?;
            println!("Sent {} byte feature report", data.0.len());
            handle.close()?;
        }
    }

    Ok(())
}

fn list(manager: &HidManager) {
    let devices = manager.list_devices();
    info!("Found {} HID interfaces", devices.len());
    for d in devices {
        println!(
            "{:04X}:{:04X} if={:<2} usage={:04X}:{:04X} {} | {} | {} | serial={}",
            d.vid,
            d.pid,
            d.interface_number,
            d.usage_page,
            d.usage,
            d.path,
            d.manufacturer.as_deref().unwrap_or("-"),
            d.product.as_deref().unwrap_or("-"),
            d.serial.as_deref().unwrap_or("-"),
        );
    }
}

fn open(manager: &HidManager, target: &Target) -> Result<DeviceHandle<HidApiDevice>> {
    let handle = match (&target.path, target.vid, target.pid, &target.serial) {
        (Some(path), _, _, _) => manager.open_path(path)?,
        (None, Some(vid), Some(pid), Some(serial)) => manager.open_serial(vid, pid, serial)?,
        (None, Some(vid), Some(pid), None) => manager.open(vid, pid)?,
        _ => anyhow::bail!("specify --path or --vid and --pid"),
    };
    Ok(handle)
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
