use serde::{Deserialize, Serialize};

/// protocol version exchanged while opening the session
pub const VERSION: i16 = 1206;

/// Timing and retry policy. Both ends should use the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct ScomConfig {
    /// how long to wait for the checksum of a sent signal before sending ABF
    pub timeout_ms: u64,
    /// how long to wait for ACK after sending a checksum before sending ABF
    pub ack_timeout_ms: u64,
    /// how long to stay around after sending ACK, in case the peer didn't get it.
    /// Must be longer than the peer's `ack_timeout_ms`.
    pub ack_wait_ms: u64,
    /// time between two ABF while no ANT arrives
    pub abf_interval_ms: u64,
    /// silence after the last ANT before resending
    pub refresh_interval_ms: u64,
    /// how long every step of the opening handshake may take
    pub signal_timeout_ms: u64,
    /// ABF sent without an answer before the connection is closed
    pub max_abf_attempts: u8,
    pub version: i16,
}

impl Default for ScomConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            ack_timeout_ms: 400,
            ack_wait_ms: 550,
            abf_interval_ms: 1000,
            refresh_interval_ms: 10,
            signal_timeout_ms: 10_000,
            max_abf_attempts: 10,
            version: VERSION,
        }
    }
}
