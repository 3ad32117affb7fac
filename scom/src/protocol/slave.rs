//! Device side of the session: waits for the master to knock, tells it which
//! protocol version it speaks and waits for the go ahead.
//!
//! ```text
//!  master                      slave
//!    | ------- SOH ---------->  |  WAITING_FOR_SIGNAL
//!    | <------ VERSION -------  |  normal checksum/ACK cycle
//!    | ------- ETX ---------->  |  WAITING_FOR_SIGNAL, open
//! ```

use defmt_or_log::{debug, info};

use super::{
    Transport,
    engine::{Engine, Handshake, State},
    error::{HandshakeStage, ScomError},
    signal::opcode,
};

pub type Slave<T> = Engine<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveStep {
    WaitingForSoh,
    VersionExchange,
    WaitingForEtx,
}

impl SlaveStep {
    fn stage(self) -> HandshakeStage {
        match self {
            SlaveStep::WaitingForSoh => HandshakeStage::WaitingForSoh,
            SlaveStep::VersionExchange => HandshakeStage::VersionExchange,
            SlaveStep::WaitingForEtx => HandshakeStage::WaitingForEtx,
        }
    }
}

impl<T: Transport> Engine<T> {
    /// Blocks until the master opened the session, see [Engine::begin_open].
    pub fn open(&mut self) -> Result<(), ScomError> {
        self.begin_open();
        self.block_on_handshake()
    }

    /// Resets the engine and starts waiting for SOH. The handshake then advances on
    /// every [Engine::update], its outcome is given by [Engine::poll_handshake].
    ///
    /// Every step has to complete within `signal_timeout_ms`.
    pub fn begin_open(&mut self) {
        self.reset();
        let now = self.transport.now_millis();
        info!("waiting for the master");
        self.set_state(State::WaitingForSignal, now);
        self.set_slave_step(SlaveStep::WaitingForSoh, now);
    }

    fn set_slave_step(&mut self, step: SlaveStep, now: u64) {
        debug!("handshake: {:?}", step);
        self.handshake = Handshake::Slave(step);
        self.handshake_since = now;
    }

    pub(super) fn drive_slave(&mut self, step: SlaveStep, now: u64) {
        if self.state == State::ConnectionClosed {
            self.fail_handshake(ScomError::HandshakeFailed(HandshakeStage::Closed));
            return;
        }
        match step {
            SlaveStep::WaitingForSoh => match self.observed.take() {
                Some(signal) if signal.payload == opcode::SOH => {
                    let version = self.config.version;
                    self.send_signal(version);
                    self.set_slave_step(SlaveStep::VersionExchange, now);
                    return;
                }
                // anything else before SOH is noise
                Some(_) => self.set_state(State::WaitingForSignal, now),
                None => {}
            },
            SlaveStep::VersionExchange => {
                if self.state == State::InAckTimeoutBuffer {
                    // version acknowledged, what comes next is the master's verdict
                    self.outstanding = None;
                    self.set_state(State::WaitingForSignal, now);
                    self.set_slave_step(SlaveStep::WaitingForEtx, now);
                    return;
                }
            }
            SlaveStep::WaitingForEtx => match self.observed.take() {
                Some(signal) if signal.payload == opcode::ETX => {
                    info!("session open");
                    self.handshake = Handshake::Done;
                    return;
                }
                Some(_) => {
                    self.fail_handshake(ScomError::HandshakeFailed(HandshakeStage::Refused));
                    return;
                }
                None => {}
            },
        }
        if now.saturating_sub(self.handshake_since) >= self.config.signal_timeout_ms {
            self.fail_handshake(ScomError::HandshakeFailed(step.stage()));
        }
    }
}
