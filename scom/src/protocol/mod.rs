//! Definitions for the SCOM protocol used over serial.
//! [Transport] is an abstraction over serial, it should be correctly implemented on each platform we support.
//! In [engine] there is the heavy lifting: the state machine that sends, acknowledges and retries frames.
//! [slave] and [master] add the two sides of the opening handshake on top of it.

pub mod checksum;
pub mod config;
pub mod engine;
pub mod error;
mod info_message;
pub mod master;
pub mod signal;
pub mod slave;

pub use info_message::{Command, INFO_CAPACITY, InfoMessage};

#[cfg(feature = "std")]
pub mod test_harness;

/// Byte-oriented serial link plus a monotonic clock. It's considered infallible:
/// an implementation that hits an I/O error should log it and behave as if the bytes were lost.
pub trait Transport {
    /// how many bytes can be read right now without blocking
    fn bytes_available(&mut self) -> usize;
    /// reads up to `buf.len()` bytes, never more than [Transport::bytes_available], returns how many were read
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize;
    /// writes all the bytes
    fn write_bytes(&mut self, bytes: &[u8]);
    /// milliseconds from an arbitrary, fixed origin
    fn now_millis(&self) -> u64;
}
