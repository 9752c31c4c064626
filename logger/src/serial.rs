use log::info;
use loracore::prelude::{DevicePort, StreamError, StreamResult};
use serialport::{ClearBuffer, SerialPort};
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

const READ_TIMEOUT: Duration = Duration::from_secs(1);
const DISCOVERY_POLL: Duration = Duration::from_secs(5);

/// Real serial port behind the core's [`DevicePort`] seam.
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
}

impl SerialDevice {
    pub fn open(path: &str, baud: u32) -> StreamResult<Self> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| StreamError::DeviceUnavailable(format!("opening {}: {}", path, e)))?;
        Ok(Self { port })
    }
}

impl DevicePort for SerialDevice {
    fn bytes_available(&mut self) -> StreamResult<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| StreamError::DeviceRead(e.to_string()))
    }

    fn read_line(&mut self) -> StreamResult<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                // Timeout mid-line hands back the partial line; the
                // driver trims and judges it like any other.
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(StreamError::DeviceRead(e.to_string())),
            }
        }
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }

    fn discard_buffered(&mut self) -> StreamResult<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| StreamError::DeviceRead(e.to_string()))
    }
}

/// First ACM port if any, first USB adapter otherwise.
pub fn find_serial_port() -> Option<String> {
    let mut names: Vec<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.port_name)
        .collect();
    names.sort();
    for prefix in ["ttyACM", "ttyUSB"] {
        if let Some(name) = names.iter().find(|n| n.contains(prefix)) {
            info!("found serial port {}", name);
            return Some(name.clone());
        }
    }
    None
}

/// Polls for a port until one appears or the window closes.
pub fn wait_for_port(window: Duration) -> Option<String> {
    let start = Instant::now();
    loop {
        if let Some(port) = find_serial_port() {
            return Some(port);
        }
        if start.elapsed() >= window {
            return None;
        }
        info!("no serial ports found, retrying...");
        thread::sleep(DISCOVERY_POLL.min(window));
    }
}
