use super::{checksum::checksum, error::ScomError};

/// Reserved payload values. A Signal carrying one of these is a control frame.
pub mod opcode {
    /// session-open request from the master
    pub const SOH: i16 = 0x01;
    /// switch to extended text mode, an [InfoMessage](crate::protocol::InfoMessage) follows
    pub const STX: i16 = 0x02;
    /// session-open confirmation from the master
    pub const ETX: i16 = 0x03;
    /// end of transmission, the master refuses the session
    pub const EOT: i16 = 0x04;
    /// abort/retransmit request
    pub const ABF: i16 = 0x05;
    /// positive acknowledgement
    pub const ACK: i16 = 0x06;
    /// keep-alive while recovering from an ABF
    pub const ANT: i16 = 0x07;

    pub fn is_reserved(payload: i16) -> bool {
        (SOH..=ANT).contains(&payload)
    }

    pub fn name(payload: i16) -> Option<&'static str> {
        Some(match payload {
            SOH => "SOH",
            STX => "STX",
            ETX => "ETX",
            EOT => "EOT",
            ABF => "ABF",
            ACK => "ACK",
            ANT => "ANT",
            _ => return None,
        })
    }
}

/// Fixed size protocol frame.
///
/// On the wire: `[payload_hi, payload_lo, sequence_hi, sequence_lo]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Signal {
    pub sequence: i16,
    pub payload: i16,
    /// when the frame was sent or parsed, not transmitted
    pub created_at: u64,
}

impl Signal {
    pub const LEN: usize = 4;

    pub fn new(sequence: i16, payload: i16) -> Self {
        Self {
            sequence,
            payload,
            created_at: 0,
        }
    }

    pub fn stamped(mut self, now: u64) -> Self {
        self.created_at = now;
        self
    }

    pub fn set_sequence(&mut self, sequence: i16) {
        self.sequence = sequence;
    }

    pub fn set_payload(&mut self, payload: i16) {
        self.payload = payload;
    }

    pub fn is_control(&self) -> bool {
        opcode::is_reserved(self.payload)
    }

    /// the checksum the receiver has to echo back
    pub fn checksum(&self) -> i16 {
        checksum(self.payload)
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let [p_hi, p_lo] = self.payload.to_be_bytes();
        let [s_hi, s_lo] = self.sequence.to_be_bytes();
        [p_hi, p_lo, s_hi, s_lo]
    }

    /// parse the first 4 bytes, the caller should make sure they are there
    pub fn decode(bytes: &[u8]) -> Result<Self, ScomError> {
        let &[p_hi, p_lo, s_hi, s_lo, ..] = bytes else {
            return Err(ScomError::Framing {
                available: bytes.len(),
            });
        };
        Ok(Self::new(
            i16::from_be_bytes([s_hi, s_lo]),
            i16::from_be_bytes([p_hi, p_lo]),
        ))
    }
}

impl core::fmt::Display for Signal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match opcode::name(self.payload) {
            Some(name) => write!(f, "#{} {}", self.sequence, name),
            None => write!(f, "#{} [{}]", self.sequence, self.payload),
        }
    }
}
