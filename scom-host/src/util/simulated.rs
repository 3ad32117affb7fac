//! In-process device, used with `--port simulated`.
//!
//! It answers the same commands the firmware does: `sonar();` replies with a
//! distance in millimeters, `zero();` zeroes the sonar, `led(x);` is just logged.

use std::{thread, time::Duration};

use scom::{fake::FakeSonar, prelude::*, protocol::test_harness::Testable};

/// returns the master end of the cable
pub fn spawn_simulated_device(config: ScomConfig) -> (Testable, thread::JoinHandle<()>) {
    let (master, device) = Testable::new(0.0, 0.0);
    let handle = thread::spawn(move || run_device(Slave::new(device, config)));
    (master, handle)
}

fn run_device(mut slave: Slave<Testable>) {
    let mut sonar = FakeSonar::new(1500);
    loop {
        if let Err(e) = slave.open() {
            log::warn!("simulated device: {e}, waiting for the master again");
            continue;
        }
        let mut reply = None;
        while slave.update().is_ok() {
            if let Some(message) = slave.take_info_message() {
                reply = handle_command(&message, &mut sonar);
            }
            if let Some(signal) = slave.take_received() {
                log::info!("simulated device got {}", signal.payload);
            }
            if let Some(value) = reply {
                if slave.send_application_signal(value).is_ok() {
                    reply = None;
                }
            }
            thread::sleep(Duration::from_micros(200));
        }
    }
}

/// the value to send back, if any
fn handle_command(message: &InfoMessage, sonar: &mut FakeSonar) -> Option<i16> {
    let command = match message.command() {
        Ok(command) => command,
        Err(e) => {
            log::warn!("simulated device: {e}: {:?}", message.as_str());
            return None;
        }
    };
    match command.body {
        "sonar" => Some(sonar.read()[0]),
        "zero" => {
            sonar.zero();
            None
        }
        "led" => {
            log::info!("simulated device: led {:?}", command.arg(0));
            None
        }
        other => {
            log::warn!("simulated device: unknown command {other}");
            None
        }
    }
}
