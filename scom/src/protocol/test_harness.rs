//! Transports to exercise the protocol without hardware.
//!
//! - [Testable]: a lossy in-memory cable between two threads, real time.
//! - [ScriptedTransport]: one engine against a script, virtual time.
//! - [SimLink]: two engines in the same thread sharing a virtual clock, with a drop filter.

use std::{
    boxed::Box,
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    sync::mpsc::{self, Receiver, Sender},
    vec::Vec,
};

use embassy_time::Instant;
use rand::{Rng, SeedableRng, rngs::SmallRng};

use super::{Transport, signal::Signal};

pub struct Testable {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    /// bytes already taken from the channel
    pending: VecDeque<u8>,
    error_rate: f64,
    omission_rate: f64,
    random: SmallRng,
}

impl Testable {
    /// Two connected ends. Every written byte is replaced by a random one with
    /// probability `error_rate` and dropped with probability `omission_rate`.
    pub fn new(error_rate: f64, omission_rate: f64) -> (Self, Self) {
        Self::with_rngs(
            error_rate,
            omission_rate,
            SmallRng::from_os_rng(),
            SmallRng::from_os_rng(),
        )
    }

    /// same as [Testable::new], reproducible
    pub fn with_seed(error_rate: f64, omission_rate: f64, seed: u64) -> (Self, Self) {
        Self::with_rngs(
            error_rate,
            omission_rate,
            SmallRng::seed_from_u64(seed),
            SmallRng::seed_from_u64(seed.wrapping_add(1)),
        )
    }

    fn with_rngs(error_rate: f64, omission_rate: f64, a: SmallRng, b: SmallRng) -> (Self, Self) {
        let (master_tx, slave_rx) = mpsc::channel::<u8>();
        let (slave_tx, master_rx) = mpsc::channel::<u8>();
        let master = Self {
            tx: master_tx,
            rx: master_rx,
            pending: VecDeque::new(),
            error_rate,
            omission_rate,
            random: a,
        };
        let slave = Self {
            tx: slave_tx,
            rx: slave_rx,
            pending: VecDeque::new(),
            error_rate,
            omission_rate,
            random: b,
        };
        (master, slave)
    }
}

impl Transport for Testable {
    fn bytes_available(&mut self) -> usize {
        self.pending.extend(self.rx.try_iter());
        self.pending.len()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let byte = if self.random.random_bool(self.error_rate) {
                self.random.random()
            } else {
                byte
            };
            if self.random.random_bool(1.0 - self.omission_rate) {
                // the other end may be gone already
                let _ = self.tx.send(byte);
            }
        }
    }

    fn now_millis(&self) -> u64 {
        Instant::now().as_millis()
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

/// Plays the peer from a script: queued incoming bytes, a log of everything written
/// and an optional responder called on every write.
///
/// Time only moves when told to, or by `tick` milliseconds every time it is read.
pub struct ScriptedTransport {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    clock: Cell<u64>,
    tick: u64,
    responder: Option<Responder>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_tick(0)
    }

    pub fn with_tick(tick: u64) -> Self {
        Self {
            incoming: VecDeque::new(),
            written: Vec::new(),
            clock: Cell::new(0),
            tick,
            responder: None,
        }
    }

    /// `responder` gets every write and returns the bytes the peer answers with
    pub fn set_responder(&mut self, responder: impl FnMut(&[u8]) -> Vec<u8> + 'static) {
        self.responder = Some(Box::new(responder));
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }

    pub fn push_signal(&mut self, sequence: i16, payload: i16) {
        self.push_bytes(&Signal::new(sequence, payload).encode());
    }

    pub fn advance(&self, ms: u64) {
        self.clock.set(self.clock.get() + ms);
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// everything written so far, as signals
    pub fn written_signals(&self) -> Vec<Signal> {
        self.written
            .chunks_exact(Signal::LEN)
            .filter_map(|c| Signal::decode(c).ok())
            .collect()
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.written)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    fn bytes_available(&mut self) -> usize {
        self.incoming.len()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.written.extend_from_slice(bytes);
        if let Some(responder) = self.responder.as_mut() {
            let answer = responder(bytes);
            self.incoming.extend(answer);
        }
    }

    fn now_millis(&self) -> u64 {
        let now = self.clock.get();
        self.clock.set(now + self.tick);
        now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

type DropFilter = Box<dyn FnMut(Side, &[u8]) -> bool>;

struct Wire {
    to_a: VecDeque<u8>,
    to_b: VecDeque<u8>,
    clock: u64,
    /// returns true for the writes that get lost
    drop: Option<DropFilter>,
    /// every write, lost ones included
    log: Vec<(Side, Vec<u8>)>,
}

impl Wire {
    fn inbox(&mut self, side: Side) -> &mut VecDeque<u8> {
        match side {
            Side::A => &mut self.to_a,
            Side::B => &mut self.to_b,
        }
    }
}

/// Two ends of a cable in a single thread, sharing a virtual clock.
pub struct SimLink {
    wire: Rc<RefCell<Wire>>,
    side: Side,
}

impl SimLink {
    pub fn pair() -> (Self, Self) {
        let wire = Rc::new(RefCell::new(Wire {
            to_a: VecDeque::new(),
            to_b: VecDeque::new(),
            clock: 0,
            drop: None,
            log: Vec::new(),
        }));
        (
            Self {
                wire: wire.clone(),
                side: Side::A,
            },
            Self { wire, side: Side::B },
        )
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// the filter sees every write with the side that made it
    pub fn set_drop_filter(&self, filter: impl FnMut(Side, &[u8]) -> bool + 'static) {
        self.wire.borrow_mut().drop = Some(Box::new(filter));
    }

    /// moves the clock of both ends
    pub fn advance(&self, ms: u64) {
        self.wire.borrow_mut().clock += ms;
    }

    /// signals written by `side`, lost ones included
    pub fn signals_from(&self, side: Side) -> Vec<Signal> {
        self.wire
            .borrow()
            .log
            .iter()
            .filter(|(s, bytes)| *s == side && bytes.len() == Signal::LEN)
            .filter_map(|(_, bytes)| Signal::decode(bytes).ok())
            .collect()
    }
}

impl Transport for SimLink {
    fn bytes_available(&mut self) -> usize {
        self.wire.borrow_mut().inbox(self.side).len()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut wire = self.wire.borrow_mut();
        let inbox = wire.inbox(self.side);
        let n = buf.len().min(inbox.len());
        for (slot, byte) in buf.iter_mut().zip(inbox.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut wire = self.wire.borrow_mut();
        wire.log.push((self.side, bytes.to_vec()));
        let lost = match wire.drop.as_mut() {
            Some(filter) => filter(self.side, bytes),
            None => false,
        };
        if !lost {
            wire.inbox(self.side.other()).extend(bytes);
        }
    }

    fn now_millis(&self) -> u64 {
        self.wire.borrow().clock
    }
}
