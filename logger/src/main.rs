use anyhow::Context;
use clap::Parser;
use config::{LoggerConfig, Settings};
use log::info;
use loracore::driver::{DriverConfig, StreamDriver};
use loracore::prelude::DevicePort;
use loracore::sink::CsvSink;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod config;
mod serial;

#[derive(Parser)]
#[command(author, version, about = "LoRa range-test serial data logger")]
struct Args {
    /// Serial port (e.g. /dev/ttyACM0); auto-detected when omitted
    #[arg(long)]
    port: Option<String>,
    /// Baud rate (default 115200)
    #[arg(long)]
    baud: Option<u32>,
    /// Directory session CSV files are written to (default ~/lora_data_logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Seconds to wait for a serial port to appear (default 60)
    #[arg(long)]
    wait_for_port: Option<u64>,
    /// Load defaults from a YAML config file; flags win over file values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> LoggerConfig {
        LoggerConfig {
            port: self.port.clone(),
            baud: self.baud,
            log_dir: self.log_dir.clone(),
            wait_for_port: self.wait_for_port,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => LoggerConfig::load(path)?,
        None => LoggerConfig::default(),
    };
    let settings = Settings::merge(args.overrides(), file);

    info!("using log directory {}", settings.log_dir.display());

    let port = match settings.port.clone() {
        Some(port) => port,
        None => {
            info!("auto-detecting serial port...");
            serial::wait_for_port(settings.wait_for_port)
                .context("no serial port found within the discovery window")?
        }
    };

    let mut device = serial::SerialDevice::open(&port, settings.baud)
        .with_context(|| format!("opening serial port {} at {} baud", port, settings.baud))?;
    // Flush whatever accumulated before we attached.
    device
        .discard_buffered()
        .context("flushing serial input buffer")?;
    info!("serial connection established on {}", port);

    let sink = CsvSink::new(&settings.log_dir)
        .with_context(|| format!("preparing log directory {}", settings.log_dir.display()))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl+C handler")?;

    info!("waiting for data... (press Ctrl+C to stop)");
    let mut driver = StreamDriver::new(device, sink, DriverConfig::default(), cancel);
    driver.run()?;
    info!("exiting");
    Ok(())
}
