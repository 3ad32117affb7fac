use scom::{prelude::*, protocol::test_harness::Testable, serial::SerialTransport};
use tokio_serial::SerialPortType;

use crate::util::simulated::spawn_simulated_device;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialPorts {
    Simulated,
    Autodiscover,
    Port(String),
}

/// Whatever the master talks through.
pub enum Link {
    Serial(SerialTransport),
    Simulated(Testable),
}

impl SerialPorts {
    pub fn parse(s: &str) -> Result<SerialPorts, String> {
        if s == "simulated" {
            Ok(SerialPorts::Simulated)
        } else if s == "auto" {
            Ok(SerialPorts::Autodiscover)
        } else if s.is_empty() {
            Err("empty port name".to_string())
        } else {
            Ok(SerialPorts::Port(s.to_string()))
        }
    }

    pub fn open(&self, baud_rate: u32, config: ScomConfig) -> Result<Link, String> {
        match self {
            SerialPorts::Simulated => {
                let (master, _device) = spawn_simulated_device(config);
                Ok(Link::Simulated(master))
            }
            SerialPorts::Autodiscover => {
                let path = Self::autodiscover()?;
                log::info!("using {path}");
                Self::open_port(&path, baud_rate)
            }
            SerialPorts::Port(path) => Self::open_port(path, baud_rate),
        }
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<Link, String> {
        SerialTransport::open(path, baud_rate)
            .map(Link::Serial)
            .map_err(|e| format!("could not open {path}: {e}"))
    }

    /// first USB serial port
    fn autodiscover() -> Result<String, String> {
        let ports = tokio_serial::available_ports().map_err(|e| e.to_string())?;
        ports
            .into_iter()
            .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
            .map(|p| p.port_name)
            .ok_or_else(|| "no USB serial port found, pass `--port <path>`".to_string())
    }
}

impl Transport for Link {
    fn bytes_available(&mut self) -> usize {
        match self {
            Link::Serial(s) => s.bytes_available(),
            Link::Simulated(s) => s.bytes_available(),
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        match self {
            Link::Serial(s) => s.read_bytes(buf),
            Link::Simulated(s) => s.read_bytes(buf),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        match self {
            Link::Serial(s) => s.write_bytes(bytes),
            Link::Simulated(s) => s.write_bytes(bytes),
        }
    }

    fn now_millis(&self) -> u64 {
        match self {
            Link::Serial(s) => s.now_millis(),
            Link::Simulated(s) => s.now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(SerialPorts::parse("simulated"), Ok(SerialPorts::Simulated));
        assert_eq!(SerialPorts::parse("auto"), Ok(SerialPorts::Autodiscover));
        assert_eq!(
            SerialPorts::parse("/dev/ttyUSB0"),
            Ok(SerialPorts::Port("/dev/ttyUSB0".to_string()))
        );
        assert!(SerialPorts::parse("").is_err());
    }
}
