use core::fmt::{self, Write};

use heapless::{String, Vec};
use serialmessage::{ParseState, SerMsg};

use super::{checksum::checksum_bytes, error::ScomError};

/// max text bytes in a single info message
pub const INFO_CAPACITY: usize = 64;
/// max bytes of a framed info message: start, id, overhead, length, crc and end byte around the text
pub const INFO_FRAME_CAPACITY: usize = INFO_CAPACITY + 6;
/// first byte of every info frame written by [SerMsg]
pub(crate) const INFO_START_BYTE: u8 = 0x7E;
/// max arguments of a [Command]
pub const MAX_ARGS: usize = 8;

/// Text payload sent after STX has been acknowledged.
///
/// Unlike signals it is framed (start byte, length, CRC, end byte), so it
/// survives arriving in more than one burst.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InfoMessage {
    bytes: Vec<u8, INFO_CAPACITY>,
}

impl InfoMessage {
    pub fn new(text: &str) -> Result<Self, ScomError> {
        Self::from_bytes(text.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ScomError> {
        let bytes = Vec::from_slice(bytes).map_err(|_| ScomError::InfoTooLong { len: bytes.len() })?;
        Ok(Self { bytes })
    }

    pub fn from_command(command: &Command<'_>) -> Result<Self, ScomError> {
        let mut text: String<INFO_CAPACITY> = String::new();
        write!(text, "{}", command).map_err(|_| ScomError::InfoTooLong {
            len: command.text_len(),
        })?;
        Self::new(&text)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// None if what arrived isn't valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }

    pub fn command(&self) -> Result<Command<'_>, ScomError> {
        Command::parse(self.as_str().ok_or(ScomError::MalformedCommand)?)
    }

    pub fn checksum(&self) -> i16 {
        checksum_bytes(&self.bytes)
    }

    /// bytes to put on the wire, `id` ends up in the frame header
    pub fn frame(&self, id: u8) -> Result<Vec<u8, INFO_FRAME_CAPACITY>, ScomError> {
        let too_long = ScomError::InfoTooLong {
            len: self.bytes.len(),
        };
        let (buf, len) = SerMsg::create_msg_arr(&self.bytes, id).ok_or(too_long)?;
        Vec::from_slice(&buf[..len]).map_err(|_| too_long)
    }
}

/// Incremental parser for info frames, fed one byte at a time.
pub(crate) struct InfoReader {
    parser: SerMsg,
    /// when the first byte of the frame being parsed arrived
    started_at: Option<u64>,
}

impl InfoReader {
    pub fn new() -> Self {
        Self {
            parser: SerMsg::new(),
            started_at: None,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn reset(&mut self) {
        self.parser = SerMsg::new();
        self.started_at = None;
    }

    /// returns the message once the last byte of its frame has been pushed
    pub fn push(&mut self, byte: u8, now: u64) -> Option<InfoMessage> {
        self.started_at.get_or_insert(now);
        let (state, _) = self.parser.parse_read_bytes(&[byte]);
        if let ParseState::DataReady = state {
            let message = InfoMessage::from_bytes(self.parser.return_read_data()).ok();
            self.reset();
            return message;
        }
        None
    }
}

/// Textual command carried by an info message: `body(arg,arg);`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub body: &'a str,
    args: Vec<&'a str, MAX_ARGS>,
}

impl<'a> Command<'a> {
    pub fn new(body: &'a str) -> Self {
        Self {
            body,
            args: Vec::new(),
        }
    }

    pub fn with_args(body: &'a str, args: &[&'a str]) -> Result<Self, ScomError> {
        Ok(Self {
            body,
            args: Vec::from_slice(args).map_err(|_| ScomError::MalformedCommand)?,
        })
    }

    pub fn add_argument(&mut self, arg: &'a str) -> Result<(), ScomError> {
        self.args.push(arg).map_err(|_| ScomError::MalformedCommand)
    }

    pub fn args(&self) -> &[&'a str] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied()
    }

    pub fn parse(text: &'a str) -> Result<Self, ScomError> {
        let text = text.trim();
        let inner = text.strip_suffix(';').ok_or(ScomError::MalformedCommand)?;
        let inner = inner.trim_end().strip_suffix(')').ok_or(ScomError::MalformedCommand)?;
        let (body, args) = inner.split_once('(').ok_or(ScomError::MalformedCommand)?;
        let body = body.trim();
        if body.is_empty() {
            return Err(ScomError::MalformedCommand);
        }
        let mut command = Self::new(body);
        if !args.trim().is_empty() {
            for arg in args.split(',') {
                command.add_argument(arg.trim())?;
            }
        }
        Ok(command)
    }

    fn text_len(&self) -> usize {
        // body ( args , ) ;
        self.body.len() + 3 + self.args.iter().map(|a| a.len() + 1).sum::<usize>()
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.body)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i != 0 {
                f.write_char(',')?;
            }
            f.write_str(arg)?;
        }
        f.write_str(");")
    }
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use test_log::test;

    use super::*;

    #[test]
    fn test_command_format() {
        let c = Command::with_args("move", &["10", "-3"]).unwrap();
        assert_eq!(c.to_string(), "move(10,-3);");
        assert_eq!(Command::new("stop").to_string(), "stop();");
    }

    #[test]
    fn test_command_parse() {
        let c = Command::parse(" move( 10, -3 ) ;").unwrap();
        assert_eq!(c.body, "move");
        assert_eq!(c.args(), &["10", "-3"]);
        assert_eq!(c.arg(1), Some("-3"));
        assert_eq!(c.arg(2), None);
        assert!(Command::parse("stop();").unwrap().args().is_empty());
        assert_eq!(Command::parse("stop()"), Err(ScomError::MalformedCommand));
        assert_eq!(Command::parse("stop;"), Err(ScomError::MalformedCommand));
        assert_eq!(Command::parse("(1);"), Err(ScomError::MalformedCommand));
    }

    #[test]
    fn test_too_long() {
        let text = [b'a'; INFO_CAPACITY + 1];
        assert_eq!(
            InfoMessage::from_bytes(&text),
            Err(ScomError::InfoTooLong {
                len: INFO_CAPACITY + 1
            })
        );
        let arg = core::str::from_utf8(&text[..INFO_CAPACITY]).unwrap();
        let c = Command::with_args("x", &[arg]).unwrap();
        assert!(matches!(
            InfoMessage::from_command(&c),
            Err(ScomError::InfoTooLong { .. })
        ));
    }

    #[test]
    fn test_frame_in_bursts() {
        let message = InfoMessage::from_command(&Command::with_args("led", &["1"]).unwrap()).unwrap();
        assert_eq!(message.as_str(), Some("led(1);"));
        let frame = message.frame(3).unwrap();
        assert_eq!(frame[0], INFO_START_BYTE);

        let mut reader = InfoReader::new();
        let (first, second) = frame.split_at(frame.len() / 2);
        for b in first {
            assert_eq!(reader.push(*b, 0), None);
        }
        assert!(reader.in_progress());
        let mut got = None;
        for b in second {
            got = reader.push(*b, 5);
        }
        assert_eq!(got, Some(message.clone()));
        assert!(!reader.in_progress());
        assert_eq!(got.unwrap().command().unwrap().arg(0), Some("1"));
    }

    #[test]
    fn test_checksum_includes_whole_text() {
        let message = InfoMessage::new("ab").unwrap();
        assert_eq!(message.checksum(), 97 + 98);
    }
}
