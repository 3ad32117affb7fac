/*!
Std only implementations
*/
use std::{boxed::Box, io::{Read, Write}, string::String, time::Duration};

use defmt_or_log::{error, info};
use embassy_time::Instant;
use tokio_serial::SerialPort;

use crate::protocol::Transport;

/// [Transport] over a real serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> tokio_serial::Result<Self> {
        // reads never block, the engine only asks for what is already there
        let port = tokio_serial::new(path, baud_rate)
            .timeout(Duration::from_millis(1))
            .open()?;
        info!("opened {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> usize {
        match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                error!("can't query the serial port: {}", e);
                0
            }
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        match self.port.read(buf) {
            Ok(n) => n,
            Err(e) => {
                error!("serial read failed: {}", e);
                0
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Err(e) = self.port.write_all(bytes).and_then(|_| self.port.flush()) {
            error!("serial write failed: {}", e);
        }
    }

    fn now_millis(&self) -> u64 {
        Instant::now().as_millis()
    }
}
