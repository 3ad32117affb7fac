//! The SCOM state machine.
//!
//! Everything is driven by [Engine::update], a non blocking tick that the host calls
//! from its main loop. Waiting is a state plus the instant it started, compared with
//! [Transport::now_millis] on every tick.
//!
//! A single exchange, seen from the side that sends `x`:
//!
//! ```text
//!  sender                              receiver
//!    | --------- x ------------------->  |  OK_CONTINUE
//!    |  WAITING_FOR_ASCII_SUM            |
//!    | <-------- checksum(x) ----------  |  WAITING_FOR_ACK
//!    | --------- ACK ----------------->  |  OK_CONTINUE, x delivered
//!    |  IN_ACK_TIMEOUT_BUFFER            |
//!    |  OK_CONTINUE (after ack_wait)     |
//! ```
//!
//! A lost or corrupted frame ends in a timeout on one of the two sides, which sends ABF
//! and waits for ANT. Once the ANTs stop the side that still has an unanswered frame
//! resends it. Only running out of ABF attempts closes the connection.

use core::fmt::Debug;

use defmt_or_log::{debug, error, trace, warn};
use heapless::Vec;

use super::{
    Transport,
    config::ScomConfig,
    error::{Recovery, ScomError},
    info_message::{INFO_START_BYTE, InfoMessage, InfoReader},
    master::MasterStep,
    signal::{Signal, opcode},
    slave::SlaveStep,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// the next signal is taken as is, without checksum cycle (opening handshake)
    WaitingForSignal,
    /// idle, ready to send or receive
    OkContinue,
    /// sent a signal, waiting for the peer to echo its checksum
    WaitingForAsciiSum,
    /// sent the checksum of a received frame, waiting for ACK
    WaitingForAck,
    /// sent ACK, staying around in case the peer missed it
    InAckTimeoutBuffer,
    /// STX acknowledged, an info message comes next
    WaitingForInfoMessage,
    /// nothing left to resend, waiting for the peer to retry
    WaitingForRepMessage,
    /// sent ABF, waiting for ANT
    WaitingForAnt,
    /// got ANT, waiting for the peer to stop sending them
    WaitingForMoreAnt,
    /// out of ABF attempts, terminal until the next open
    ConnectionClosed,
}

/// Frame we sent that still expects an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Outstanding {
    /// application signal, waiting for its checksum
    Signal(Signal),
    /// info message, waiting for its checksum
    Info { message: InfoMessage, id: u8 },
    /// checksum of a received frame, waiting for ACK
    Sum(Signal),
}

impl Outstanding {
    fn expected_sum(&self) -> Option<i16> {
        match self {
            Outstanding::Signal(s) => Some(s.checksum()),
            Outstanding::Info { message, .. } => Some(message.checksum()),
            Outstanding::Sum(_) => None,
        }
    }
}

/// Counters of what happened on the link since the last open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub frames_sent: u32,
    pub frames_received: u32,
    pub retransmissions: u32,
    pub abf_sent: u32,
    pub checksum_mismatches: u32,
    pub sum_timeouts: u32,
    pub ack_timeouts: u32,
    pub ant_timeouts: u32,
    pub peer_aborts: u32,
}

impl LinkStats {
    fn record(&mut self, cause: Recovery) {
        match cause {
            Recovery::ChecksumMismatch => self.checksum_mismatches += 1,
            Recovery::SumTimeout => self.sum_timeouts += 1,
            Recovery::AckTimeout => self.ack_timeouts += 1,
            Recovery::AntTimeout => self.ant_timeouts += 1,
            Recovery::PeerAbort => self.peer_aborts += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Handshake {
    Idle,
    Slave(SlaveStep),
    Master(MasterStep),
    Done,
    Failed(ScomError),
}

enum Incoming {
    Signal(Signal),
    Info(InfoMessage),
}

/// One end of a SCOM link. Owns its transport exclusively.
///
/// [Slave](super::slave::Slave) and [Master](super::master::Master) are the same engine,
/// they only differ in how the session is opened.
pub struct Engine<T: Transport> {
    pub(super) transport: T,
    pub(super) config: ScomConfig,
    pub(super) state: State,
    /// reference instant for the deadline of the current state
    pub(super) since: u64,
    pub(super) next_sequence: i16,
    pub(super) abf_attempts: u8,
    /// last sent frame still waiting for an answer
    pub(super) outstanding: Option<Outstanding>,
    /// our own frame interrupted by the peer's, resent once the peer's one is acknowledged
    deferred: Option<Outstanding>,
    pub(super) last_received: Option<Signal>,
    /// last peer frame we acknowledged, if it shows up again it gets ACK again
    acked: Option<Signal>,
    /// info message whose checksum we sent, delivered on ACK
    pending_info: Option<InfoMessage>,
    /// info message to write once our STX is acknowledged
    queued_info: Option<InfoMessage>,
    pub(super) delivered: Option<Signal>,
    delivered_sequence: Option<i16>,
    received_info: Option<InfoMessage>,
    /// signal taken in [State::WaitingForSignal], consumed by the handshake
    pub(super) observed: Option<Signal>,
    /// partial signal
    rx: Vec<u8, { Signal::LEN }>,
    /// arrival of the first byte in `rx`
    rx_started_at: Option<u64>,
    info_reader: InfoReader,
    pub(super) handshake: Handshake,
    pub(super) handshake_since: u64,
    pub(super) stats: LinkStats,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T, config: ScomConfig) -> Self {
        let now = transport.now_millis();
        Self {
            transport,
            config,
            state: State::OkContinue,
            since: now,
            next_sequence: 0,
            abf_attempts: 0,
            outstanding: None,
            deferred: None,
            last_received: None,
            acked: None,
            pending_info: None,
            queued_info: None,
            delivered: None,
            delivered_sequence: None,
            received_info: None,
            observed: None,
            rx: Vec::new(),
            rx_started_at: None,
            info_reader: InfoReader::new(),
            handshake: Handshake::Idle,
            handshake_since: now,
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.handshake == Handshake::Done && self.state != State::ConnectionClosed
    }

    pub fn config(&self) -> &ScomConfig {
        &self.config
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// next sequence number to be used
    pub fn sequence(&self) -> i16 {
        self.next_sequence
    }

    pub fn abf_attempts(&self) -> u8 {
        self.abf_attempts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn last_received_payload(&self) -> Option<i16> {
        self.last_received.map(|s| s.payload)
    }

    /// every acknowledged signal is returned once, retransmissions are filtered out
    pub fn take_received(&mut self) -> Option<Signal> {
        self.delivered.take()
    }

    pub fn take_info_message(&mut self) -> Option<InfoMessage> {
        self.received_info.take()
    }

    /// true when a new signal or info message can be sent
    pub fn is_ready(&self) -> bool {
        self.ensure_ready().is_ok()
    }

    fn ensure_ready(&self) -> Result<(), ScomError> {
        if self.state == State::ConnectionClosed {
            return Err(ScomError::ConnectionClosed);
        }
        if self.handshake != Handshake::Done {
            return Err(ScomError::NotOpen);
        }
        if self.state != State::OkContinue {
            return Err(ScomError::Busy);
        }
        Ok(())
    }

    /// Sends an application value, reserved opcodes are refused.
    /// Only one frame can be waiting for acknowledgement, see [Engine::is_ready].
    pub fn send_application_signal(&mut self, payload: i16) -> Result<(), ScomError> {
        if opcode::is_reserved(payload) {
            return Err(ScomError::ReservedPayload(payload));
        }
        self.ensure_ready()?;
        self.send_signal(payload);
        Ok(())
    }

    /// Sends STX, then the text once STX is acknowledged.
    pub fn send_info_message(&mut self, text: &str) -> Result<(), ScomError> {
        let message = InfoMessage::new(text)?;
        self.ensure_ready()?;
        self.queued_info = Some(message);
        self.send_signal(opcode::STX);
        Ok(())
    }

    /// One tick: reads at most one frame, advances the state machine, fires expired timeouts.
    ///
    /// Recoverable problems never show up here, only [ScomError::ConnectionClosed] does.
    pub fn update(&mut self) -> Result<(), ScomError> {
        if self.state == State::ConnectionClosed {
            return Err(ScomError::ConnectionClosed);
        }
        let now = self.transport.now_millis();
        match self.poll_incoming(now) {
            Some(Incoming::Signal(signal)) => self.on_signal(signal, now),
            Some(Incoming::Info(message)) => self.on_info(message, now),
            None => {}
        }
        self.check_deadlines(now);
        self.drive_handshake(now);

        if self.state == State::ConnectionClosed {
            Err(ScomError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// back to a fresh engine, ready for a new handshake
    pub(super) fn reset(&mut self) {
        let now = self.transport.now_millis();
        debug!("reset");
        self.state = State::OkContinue;
        self.since = now;
        self.next_sequence = 0;
        self.abf_attempts = 0;
        self.outstanding = None;
        self.deferred = None;
        self.last_received = None;
        self.acked = None;
        self.pending_info = None;
        self.queued_info = None;
        self.delivered = None;
        self.delivered_sequence = None;
        self.received_info = None;
        self.observed = None;
        self.discard_partial();
        self.info_reader.reset();
        self.handshake = Handshake::Idle;
        self.handshake_since = now;
        self.stats = LinkStats::default();
    }

    pub(super) fn set_state(&mut self, state: State, now: u64) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.since = now;
    }

    pub(super) fn close(&mut self) {
        error!("connection closed");
        self.outstanding = None;
        self.deferred = None;
        self.queued_info = None;
        self.pending_info = None;
        self.state = State::ConnectionClosed;
    }

    fn take_sequence(&mut self) -> i16 {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);
        sequence
    }

    fn write_signal(&mut self, signal: &Signal) {
        trace!("sent {}", signal);
        self.transport.write_bytes(&signal.encode());
        self.stats.frames_sent += 1;
    }

    /// writes a frame that expects no answer
    pub(super) fn send_control(&mut self, payload: i16) -> Signal {
        let now = self.transport.now_millis();
        let signal = Signal::new(self.take_sequence(), payload).stamped(now);
        self.write_signal(&signal);
        signal
    }

    /// writes a frame that expects its checksum back
    pub(super) fn send_signal(&mut self, payload: i16) {
        let now = self.transport.now_millis();
        let signal = Signal::new(self.take_sequence(), payload).stamped(now);
        self.outstanding = Some(Outstanding::Signal(signal));
        self.set_state(State::WaitingForAsciiSum, now);
        self.write_signal(&signal);
    }

    fn write_info(&mut self, message: InfoMessage, now: u64) {
        let id = self.take_sequence() as u8;
        match message.frame(id) {
            Ok(frame) => {
                trace!("sent info message of {} bytes", message.as_bytes().len());
                self.transport.write_bytes(&frame);
                self.stats.frames_sent += 1;
                self.outstanding = Some(Outstanding::Info { message, id });
                self.set_state(State::WaitingForAsciiSum, now);
            }
            Err(e) => {
                // checked when queued, can't happen
                error!("dropping info message: {}", e);
                self.set_state(State::OkContinue, now);
            }
        }
    }

    fn resend_outstanding(&mut self, now: u64) {
        let Some(outstanding) = self.outstanding.clone() else {
            self.set_state(State::WaitingForRepMessage, now);
            return;
        };
        self.stats.retransmissions += 1;
        match outstanding {
            Outstanding::Signal(signal) => {
                debug!("resending {}", signal);
                self.write_signal(&signal);
                self.set_state(State::WaitingForAsciiSum, now);
            }
            Outstanding::Info { message, id } => {
                debug!("resending info message");
                if let Ok(frame) = message.frame(id) {
                    self.transport.write_bytes(&frame);
                    self.stats.frames_sent += 1;
                }
                self.set_state(State::WaitingForAsciiSum, now);
            }
            Outstanding::Sum(signal) => {
                debug!("resending checksum {}", signal);
                self.write_signal(&signal);
                self.set_state(State::WaitingForAck, now);
            }
        }
    }

    fn send_abf(&mut self, cause: Recovery, now: u64) {
        self.stats.record(cause);
        if self.abf_attempts >= self.config.max_abf_attempts {
            error!("{:?}: no answer after {} ABF", cause, self.abf_attempts);
            self.close();
            return;
        }
        self.abf_attempts += 1;
        warn!("{:?}: sending ABF, attempt {}", cause, self.abf_attempts);
        self.stats.abf_sent += 1;
        self.send_control(opcode::ABF);
        self.set_state(State::WaitingForAnt, now);
    }

    fn answer_abf(&mut self) {
        self.stats.record(Recovery::PeerAbort);
        warn!("peer sent ABF, answering ANT");
        self.send_control(opcode::ANT);
    }

    fn send_ack(&mut self, acked: Signal, now: u64) {
        self.acked = Some(acked);
        self.send_control(opcode::ACK);
        self.set_state(State::InAckTimeoutBuffer, now);
    }

    fn is_acked_copy(&self, signal: &Signal) -> bool {
        self.acked
            .is_some_and(|a| a.sequence == signal.sequence && a.payload == signal.payload)
    }

    fn accepts_info(&self) -> bool {
        self.state == State::WaitingForInfoMessage || self.pending_info.is_some()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8];
        (self.transport.read_bytes(&mut byte) == 1).then_some(byte[0])
    }

    fn discard_partial(&mut self) {
        self.rx.clear();
        self.rx_started_at = None;
    }

    /// Drops the partial signal and whatever is left of the current burst, the
    /// next frame from the peer starts aligned again.
    fn resync(&mut self) {
        if !self.rx.is_empty() {
            debug!("dropping {} bytes of a partial signal", self.rx.len());
        }
        self.discard_partial();
        let mut scratch = [0u8; 16];
        while self.transport.bytes_available() > 0 {
            if self.transport.read_bytes(&mut scratch) == 0 {
                break;
            }
        }
    }

    /// Reads until a whole frame is there or the transport is empty.
    fn poll_incoming(&mut self, now: u64) -> Option<Incoming> {
        if let Some(start) = self.info_reader.started_at() {
            if now.saturating_sub(start) >= self.config.ack_timeout_ms {
                warn!("incomplete info message dropped");
                self.info_reader.reset();
            }
        }
        if let Some(start) = self.rx_started_at {
            if now.saturating_sub(start) >= self.config.ack_timeout_ms {
                warn!("incomplete signal dropped ({} bytes)", self.rx.len());
                self.discard_partial();
            }
        }
        while self.transport.bytes_available() > 0 {
            if self.info_reader.in_progress() {
                let byte = self.read_byte()?;
                if let Some(message) = self.info_reader.push(byte, now) {
                    return Some(Incoming::Info(message));
                }
                continue;
            }
            if self.rx.is_empty() && self.accepts_info() {
                // info frames and signals share the line, the first byte tells them apart
                let byte = self.read_byte()?;
                if byte == INFO_START_BYTE {
                    self.info_reader.push(byte, now);
                } else {
                    let _ = self.rx.push(byte);
                    self.rx_started_at = Some(now);
                }
                continue;
            }
            let mut buf = [0u8; Signal::LEN];
            let missing = Signal::LEN - self.rx.len();
            let read = self.transport.read_bytes(&mut buf[..missing]);
            if read == 0 {
                break;
            }
            if self.rx.is_empty() {
                self.rx_started_at = Some(now);
            }
            let _ = self.rx.extend_from_slice(&buf[..read]);
            if self.rx.is_full() {
                let signal = Signal::decode(&self.rx).ok();
                self.discard_partial();
                return signal.map(|s| Incoming::Signal(s.stamped(now)));
            }
        }
        None
    }

    fn on_info(&mut self, message: InfoMessage, now: u64) {
        self.stats.frames_received += 1;
        if !self.accepts_info() {
            trace!("unexpected info message dropped");
            return;
        }
        trace!("received info message of {} bytes", message.as_bytes().len());
        let sum = Signal::new(self.take_sequence(), message.checksum()).stamped(now);
        self.pending_info = Some(message);
        self.outstanding = Some(Outstanding::Sum(sum));
        self.set_state(State::WaitingForAck, now);
        self.write_signal(&sum);
    }

    fn on_signal(&mut self, signal: Signal, now: u64) {
        trace!("received {}", signal);
        self.stats.frames_received += 1;
        if signal.sequence >= self.next_sequence {
            self.next_sequence = signal.sequence.wrapping_add(1);
        }

        // the master didn't hear our version yet and asks again
        if signal.payload == opcode::SOH
            && self.state != State::WaitingForSignal
            && matches!(self.handshake, Handshake::Slave(SlaveStep::VersionExchange))
        {
            self.resend_outstanding(now);
            return;
        }
        self.dispatch(signal, now);
    }

    fn dispatch(&mut self, signal: Signal, now: u64) {
        match self.state {
            State::ConnectionClosed => {}
            State::WaitingForSignal => self.on_signal_waiting(signal, now),
            State::OkContinue => self.on_signal_idle(signal, now),
            State::WaitingForAsciiSum => {
                let expected = self.outstanding.as_ref().and_then(Outstanding::expected_sum);
                if expected == Some(signal.payload) {
                    self.abf_attempts = 0;
                    self.send_ack(signal, now);
                } else {
                    let cause = if signal.payload == opcode::ABF {
                        Recovery::PeerAbort
                    } else {
                        Recovery::ChecksumMismatch
                    };
                    self.stats.record(cause);
                    warn!("{:?}: got {} instead of the checksum", cause, signal);
                    if cause == Recovery::ChecksumMismatch {
                        // a lost or stray byte shifts every later frame
                        self.resync();
                    }
                    self.resend_outstanding(now);
                }
            }
            State::WaitingForAck => match signal.payload {
                opcode::ACK => self.on_ack(now),
                opcode::ABF => {
                    self.answer_abf();
                    self.since = now;
                }
                // the peer didn't like our checksum and sent the same frame again
                _ if self.last_received.is_some_and(|r| r.sequence == signal.sequence) => {
                    self.receive_data(signal, now)
                }
                _ => trace!("ignored {} while waiting for ACK", signal),
            },
            State::InAckTimeoutBuffer => {
                if self.is_acked_copy(&signal) {
                    // our ACK got lost
                    self.send_control(opcode::ACK);
                    self.since = now;
                } else {
                    match signal.payload {
                        opcode::ABF => {
                            self.answer_abf();
                            self.since = now;
                        }
                        opcode::ANT | opcode::ACK => trace!("ignored {} in ACK buffer", signal),
                        // the peer got our ACK and moved on
                        _ => {
                            self.finish_ack_buffer(now);
                            self.dispatch(signal, now);
                        }
                    }
                }
            }
            State::WaitingForInfoMessage => match signal.payload {
                opcode::ABF => {
                    self.answer_abf();
                    self.since = now;
                }
                _ => trace!("ignored {} while waiting for an info message", signal),
            },
            State::WaitingForAnt | State::WaitingForMoreAnt | State::WaitingForRepMessage => {
                self.on_signal_recovering(signal, now)
            }
        }
    }

    fn on_signal_waiting(&mut self, signal: Signal, now: u64) {
        match signal.payload {
            opcode::ABF => self.answer_abf(),
            opcode::ANT | opcode::ACK => trace!("ignored {} while waiting for a signal", signal),
            _ if self.is_acked_copy(&signal) => {
                self.send_control(opcode::ACK);
            }
            _ => {
                self.last_received = Some(signal);
                self.observed = Some(signal);
                self.outstanding = None;
                self.set_state(State::OkContinue, now);
            }
        }
    }

    fn on_signal_idle(&mut self, signal: Signal, now: u64) {
        match signal.payload {
            opcode::ANT => self.set_state(State::WaitingForMoreAnt, now),
            opcode::ABF => self.answer_abf(),
            opcode::ACK => trace!("ignored stray ACK"),
            _ if self.is_acked_copy(&signal) => self.send_ack(signal, now),
            _ => self.receive_data(signal, now),
        }
    }

    fn on_signal_recovering(&mut self, signal: Signal, now: u64) {
        let expected = self.outstanding.as_ref().and_then(Outstanding::expected_sum);
        match signal.payload {
            opcode::ANT => self.set_state(State::WaitingForMoreAnt, now),
            opcode::ABF => self.answer_abf(),
            opcode::ACK => {
                if matches!(self.outstanding, Some(Outstanding::Sum(_))) {
                    self.on_ack(now);
                } else {
                    trace!("ignored ACK while recovering");
                }
            }
            p if expected == Some(p) => {
                self.abf_attempts = 0;
                self.send_ack(signal, now);
            }
            _ if self.is_acked_copy(&signal) => self.send_ack(signal, now),
            // the peer retries on its own
            _ => self.receive_data(signal, now),
        }
    }

    /// application data from the peer: echo its checksum and wait for ACK
    fn receive_data(&mut self, signal: Signal, now: u64) {
        if matches!(
            self.outstanding,
            Some(Outstanding::Signal(_) | Outstanding::Info { .. })
        ) && self.deferred.is_none()
        {
            debug!("peer frame interrupted ours, deferring it");
            self.deferred = self.outstanding.take();
        }
        self.last_received = Some(signal);
        let sum = Signal::new(self.take_sequence(), signal.checksum()).stamped(now);
        self.pending_info = None;
        self.outstanding = Some(Outstanding::Sum(sum));
        self.set_state(State::WaitingForAck, now);
        self.write_signal(&sum);
    }

    fn on_ack(&mut self, now: u64) {
        self.outstanding = None;
        self.abf_attempts = 0;
        if let Some(info) = self.pending_info.take() {
            debug!("info message acknowledged");
            self.received_info = Some(info);
            self.set_state(State::OkContinue, now);
        } else if let Some(received) = self.last_received {
            if received.payload == opcode::STX {
                self.set_state(State::WaitingForInfoMessage, now);
                return;
            }
            self.deliver(received);
            self.set_state(State::OkContinue, now);
        } else {
            self.set_state(State::OkContinue, now);
        }
        self.resume_deferred(now);
    }

    fn deliver(&mut self, signal: Signal) {
        if self.delivered_sequence == Some(signal.sequence) {
            trace!("{} already delivered", signal);
            return;
        }
        self.delivered_sequence = Some(signal.sequence);
        self.delivered = Some(signal);
    }

    fn resume_deferred(&mut self, now: u64) {
        if let Some(deferred) = self.deferred.take() {
            self.outstanding = Some(deferred);
            self.resend_outstanding(now);
        }
    }

    /// the ACK buffer is over: the last sent frame is done with
    fn finish_ack_buffer(&mut self, now: u64) {
        let acked = self.outstanding.take();
        self.set_state(State::OkContinue, now);
        if let Some(Outstanding::Signal(s)) = acked {
            if s.payload == opcode::STX {
                if let Some(message) = self.queued_info.take() {
                    self.write_info(message, now);
                    return;
                }
            }
        }
        self.resume_deferred(now);
    }

    fn check_deadlines(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.since);
        match self.state {
            State::WaitingForAsciiSum if elapsed >= self.config.timeout_ms => {
                self.send_abf(Recovery::SumTimeout, now)
            }
            State::WaitingForAck if elapsed >= self.config.ack_timeout_ms => {
                self.send_abf(Recovery::AckTimeout, now)
            }
            State::InAckTimeoutBuffer if elapsed >= self.config.ack_wait_ms => {
                self.finish_ack_buffer(now)
            }
            State::WaitingForAnt if elapsed >= self.config.abf_interval_ms => {
                self.send_abf(Recovery::AntTimeout, now)
            }
            State::WaitingForMoreAnt if elapsed >= self.config.refresh_interval_ms => {
                self.resend_outstanding(now)
            }
            State::WaitingForRepMessage if elapsed >= self.config.timeout_ms => {
                debug!("peer had nothing to resend");
                self.set_state(State::OkContinue, now);
                self.resume_deferred(now);
            }
            State::WaitingForInfoMessage if elapsed >= self.config.signal_timeout_ms => {
                warn!("no info message after STX, giving up");
                self.set_state(State::OkContinue, now);
            }
            _ => {}
        }
    }

    fn drive_handshake(&mut self, now: u64) {
        match self.handshake {
            Handshake::Slave(step) => self.drive_slave(step, now),
            Handshake::Master(step) => self.drive_master(step, now),
            Handshake::Idle | Handshake::Done | Handshake::Failed(_) => {}
        }
    }

    /// None while the handshake is running
    pub fn poll_handshake(&self) -> Option<Result<(), ScomError>> {
        match self.handshake {
            Handshake::Slave(_) | Handshake::Master(_) => None,
            Handshake::Done => Some(Ok(())),
            Handshake::Failed(e) => Some(Err(e)),
            Handshake::Idle => Some(Err(ScomError::NotOpen)),
        }
    }

    pub(super) fn fail_handshake(&mut self, error: ScomError) {
        error!("handshake failed: {}", error);
        self.handshake = Handshake::Failed(error);
        if self.state != State::ConnectionClosed {
            self.close();
        }
    }

    /// runs [Engine::update] until the handshake is over
    pub(super) fn block_on_handshake(&mut self) -> Result<(), ScomError> {
        loop {
            let _ = self.update();
            if let Some(result) = self.poll_handshake() {
                return result;
            }
        }
    }
}

impl<T: Transport> Debug for Engine<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("sequence", &self.next_sequence)
            .field("abf_attempts", &self.abf_attempts)
            .field("handshake", &self.handshake)
            .finish()
    }
}
