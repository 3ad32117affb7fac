use std::{
    thread,
    time::{Duration, Instant},
};

use scom::prelude::*;
use scom::protocol::Command;

use crate::util::serial::Link;

/// between two ticks of the engine
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Blocking helpers on top of an open [Master].
pub struct Session<T: Transport> {
    master: Master<T>,
}

impl<T: Transport> Session<T> {
    pub fn connect(transport: T, config: ScomConfig) -> Result<Self, ScomError> {
        let mut master = Master::new(transport, config);
        master.connect()?;
        Ok(Self { master })
    }

    pub fn stats(&self) -> LinkStats {
        self.master.stats()
    }

    fn wait_ready(&mut self) -> Result<(), ScomError> {
        while !self.master.is_ready() {
            self.master.update()?;
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    /// returns once the value has been acknowledged
    pub fn send(&mut self, value: i16) -> Result<(), ScomError> {
        self.wait_ready()?;
        self.master.send_application_signal(value)?;
        self.wait_ready()
    }

    pub fn command(&mut self, command: &Command<'_>) -> Result<(), ScomError> {
        let message = InfoMessage::from_command(command)?;
        let text = message.as_str().ok_or(ScomError::MalformedCommand)?;
        self.wait_ready()?;
        self.master.send_info_message(text)?;
        self.wait_ready()
    }

    /// next value sent by the device, None if nothing came within `timeout`
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<i16>, ScomError> {
        let start = Instant::now();
        loop {
            if let Some(signal) = self.master.take_received() {
                return Ok(Some(signal.payload));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            self.master.update()?;
            thread::sleep(POLL_INTERVAL);
        }
    }
}

pub type HostSession = Session<Link>;

#[cfg(test)]
mod tests {
    use scom::protocol::test_harness::Testable;

    use super::*;
    use crate::util::simulated::spawn_simulated_device;

    #[test]
    fn test_simulated_device() {
        let config = ScomConfig::default();
        let (link, _device) = spawn_simulated_device(config);
        let mut session: Session<Testable> = Session::connect(link, config).unwrap();

        session.send(42).unwrap();
        session.command(&Command::with_args("led", &["1"]).unwrap()).unwrap();
        session.command(&Command::new("sonar")).unwrap();
        let distance = session.receive(Duration::from_secs(3)).unwrap().unwrap();
        assert!((1400..=1600).contains(&distance));
        assert_eq!(session.stats().abf_sent, 0);
    }
}
