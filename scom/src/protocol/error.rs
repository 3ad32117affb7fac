/// Errors visible to the user of the protocol.
///
/// Checksum mismatches and timeouts are not here: they are part of the normal
/// life of the link and are handled by the state machine, see [Recovery].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScomError {
    #[error("a signal needs 4 bytes, only {available} available")]
    Framing { available: usize },
    #[error("handshake failed while {0}")]
    HandshakeFailed(HandshakeStage),
    #[error("peer speaks protocol version {peer}, we speak {local}")]
    IncompatibleVersion { local: i16, peer: i16 },
    #[error("connection closed, open it again")]
    ConnectionClosed,
    #[error("connection not open yet")]
    NotOpen,
    #[error("a frame is still waiting for acknowledgement")]
    Busy,
    #[error("payload {0} is a reserved opcode")]
    ReservedPayload(i16),
    #[error("info message of {len} bytes doesn't fit")]
    InfoTooLong { len: usize },
    #[error("malformed command")]
    MalformedCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeStage {
    WaitingForSoh,
    VersionExchange,
    WaitingForEtx,
    /// master side
    WaitingForVersion,
    /// got something else than ETX
    Refused,
    Closed,
}

impl core::fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            HandshakeStage::WaitingForSoh => "waiting for SOH",
            HandshakeStage::VersionExchange => "exchanging the protocol version",
            HandshakeStage::WaitingForEtx => "waiting for ETX",
            HandshakeStage::WaitingForVersion => "waiting for the slave version",
            HandshakeStage::Refused => "confirming the session, peer refused",
            HandshakeStage::Closed => "recovering, connection closed",
        })
    }
}

/// Why the engine had to retransmit or start an ABF round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recovery {
    /// the peer echoed a wrong checksum
    ChecksumMismatch,
    /// no checksum arrived within `timeout_ms`
    SumTimeout,
    /// no ACK arrived within `ack_timeout_ms`
    AckTimeout,
    /// no ANT arrived within `abf_interval_ms`
    AntTimeout,
    /// the peer sent ABF
    PeerAbort,
}
