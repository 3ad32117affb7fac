//! Host side of the session: knocks with SOH until the slave answers with its
//! protocol version, then accepts it with ETX or refuses it with EOT.

use defmt_or_log::{debug, info, warn};

use super::{
    Transport,
    engine::{Engine, Handshake, State},
    error::{HandshakeStage, ScomError},
    signal::{Signal, opcode},
};

pub type Master<T> = Engine<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterStep {
    /// `soh` is written again every `timeout_ms` as long as the slave stays silent
    WaitingForVersion { soh: Signal, sent_at: u64 },
}

impl<T: Transport> Engine<T> {
    /// Blocks until the slave answered, see [Engine::begin_connect].
    pub fn connect(&mut self) -> Result<(), ScomError> {
        self.begin_connect();
        self.block_on_handshake()
    }

    /// Resets the engine and sends SOH. The handshake then advances on every
    /// [Engine::update], its outcome is given by [Engine::poll_handshake].
    ///
    /// Fails with [ScomError::IncompatibleVersion] if the slave speaks another version,
    /// or with [ScomError::HandshakeFailed] if it doesn't answer within `signal_timeout_ms`.
    pub fn begin_connect(&mut self) {
        self.reset();
        let now = self.transport.now_millis();
        info!("knocking on the slave");
        let soh = self.send_control(opcode::SOH);
        self.handshake = Handshake::Master(MasterStep::WaitingForVersion { soh, sent_at: now });
        self.handshake_since = now;
    }

    pub(super) fn drive_master(&mut self, step: MasterStep, now: u64) {
        if self.state == State::ConnectionClosed {
            self.fail_handshake(ScomError::HandshakeFailed(HandshakeStage::Closed));
            return;
        }
        let MasterStep::WaitingForVersion { soh, sent_at } = step;
        if let Some(version) = self.delivered.take() {
            if version.payload == self.config.version {
                self.send_control(opcode::ETX);
                info!("session open, version {}", version.payload);
                self.handshake = Handshake::Done;
            } else {
                self.send_control(opcode::EOT);
                self.fail_handshake(ScomError::IncompatibleVersion {
                    local: self.config.version,
                    peer: version.payload,
                });
            }
            return;
        }
        if now.saturating_sub(self.handshake_since) >= self.config.signal_timeout_ms {
            warn!("no version from the slave");
            self.fail_handshake(ScomError::HandshakeFailed(HandshakeStage::WaitingForVersion));
            return;
        }
        // once the slave said anything at all, the normal recovery takes over
        if self.state == State::OkContinue
            && self.stats.frames_received == 0
            && now.saturating_sub(sent_at) >= self.config.timeout_ms
        {
            debug!("slave silent, SOH again");
            self.transport.write_bytes(&soh.encode());
            self.stats.frames_sent += 1;
            self.stats.retransmissions += 1;
            self.handshake = Handshake::Master(MasterStep::WaitingForVersion { soh, sent_at: now });
        }
    }
}
