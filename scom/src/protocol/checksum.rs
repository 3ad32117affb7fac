//! ASCII sum used to confirm that the peer parsed a payload correctly.
//!
//! The receiver answers every application frame with the checksum of what it read,
//! the sender compares it with its own and only then sends ACK.

use core::fmt::Write;

use heapless::String;

/// Sum of the ASCII codes of the decimal representation of `value` (minus sign included),
/// wrapping on overflow.
pub fn checksum(value: i16) -> i16 {
    // "-32768" is the longest representation
    let mut digits: String<6> = String::new();
    // can't fail, the buffer fits every i16
    let _ = write!(digits, "{}", value);
    checksum_bytes(digits.as_bytes())
}

/// Checksum of a text payload. Bytes are summed as signed chars, the
/// trailing terminator is part of the sum but adds nothing.
pub fn checksum_bytes(bytes: &[u8]) -> i16 {
    bytes
        .iter()
        .fold(0i16, |sum, b| sum.wrapping_add(*b as i8 as i16))
}

pub fn checksum_str(text: &str) -> i16 {
    checksum_bytes(text.as_bytes())
}
