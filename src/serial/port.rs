/// Serial transport for the EA15 USB/RS-232 cable
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::Ea15Error;

// Fixed operating parameters of the meter
pub const BAUD_RATE: u32 = 9600;
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);
const READ_CHUNK: usize = 64;

/// Byte transport consumed by the session controller.
///
/// A read that times out returns `Ok(0)`; callers treat that as "try again".
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;

    /// Preferred read size for one unit of work.
    fn chunk_size(&self) -> usize {
        READ_CHUNK
    }
}

/// A real serial port opened through the `serialport` crate.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    path: String,
}

impl SerialTransport {
    pub fn open(path: &str) -> Result<Self, Ea15Error> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|source| Ea15Error::Open {
                path: path.to_string(),
                source,
            })?;

        info!("Opened {} at {} baud", path, BAUD_RATE);
        Ok(SerialTransport {
            port,
            path: path.to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!("Closing {}", self.path);
    }
}

/// Describe the serial ports visible to the system, one entry per port.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|port| match port.port_type {
                serialport::SerialPortType::UsbPort(info) => format!(
                    "{} - USB (VID: 0x{:04x}, PID: 0x{:04x}){}",
                    port.port_name,
                    info.vid,
                    info.pid,
                    info.product.map(|p| format!(" {}", p)).unwrap_or_default()
                ),
                serialport::SerialPortType::BluetoothPort => {
                    format!("{} - Bluetooth", port.port_name)
                }
                serialport::SerialPortType::PciPort => format!("{} - PCI", port.port_name),
                serialport::SerialPortType::Unknown => format!("{} - Unknown", port.port_name),
            })
            .collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
