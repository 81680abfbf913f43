//! RESP request decoder
//!
//! Parses one request frame at a time from a byte buffer. Short input is
//! reported as `Incomplete` (the caller keeps the bytes and retries after
//! the next read); malformed input is a `FrameError` whose display string
//! is sent verbatim in the `-ERR` reply.

use thiserror::Error;

use super::Command;

/// A structured protocol defect. The message names the specific problem and
/// goes on the wire as `-ERR <message>\r\n`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Invalid request: missing array marker")]
    MissingArrayMarker,

    #[error("Invalid request: invalid argument count")]
    InvalidArgumentCount,

    #[error("Invalid request: unexpected argument count")]
    UnexpectedArgumentCount,

    #[error("Invalid request: missing {0} string marker")]
    MissingBulkMarker(&'static str),

    #[error("Invalid request: invalid {0} length")]
    InvalidBulkLength(&'static str),

    #[error("Invalid request: truncated {0}")]
    TruncatedBulk(&'static str),

    #[error("Invalid request: unknown operation")]
    UnknownOperation,

    #[error("Invalid request: SET requires a value")]
    SetRequiresValue,

    #[error("Invalid request: too many arguments")]
    TooManyArguments,

    #[error("Invalid request: empty key")]
    EmptyKey,
}

/// Outcome of a decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A full frame was parsed; `consumed` bytes belong to it
    Frame { command: Command, consumed: usize },

    /// The buffer holds a prefix of a frame; wait for more bytes
    Incomplete,
}

/// Decode a single request frame from the start of `input`.
///
/// Leftover bytes after `consumed` are the next frame (pipelining).
pub fn decode(input: &[u8]) -> Result<Decoded, FrameError> {
    let mut cursor = Cursor { input, pos: 0 };
    match cursor.parse_frame()? {
        Some(command) => Ok(Decoded::Frame {
            command,
            consumed: cursor.pos,
        }),
        None => Ok(Decoded::Incomplete),
    }
}

/// Parse position over the input buffer. Methods return `Ok(None)` when the
/// buffer ends mid-frame.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn parse_frame(&mut self) -> Result<Option<Command>, FrameError> {
        if self.input.is_empty() {
            return Ok(None);
        }
        if self.input[0] != b'*' {
            return Err(FrameError::MissingArrayMarker);
        }
        self.pos = 1;

        let header = match self.take_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let num_args = parse_decimal(header).ok_or(FrameError::InvalidArgumentCount)?;
        if !(2..=3).contains(&num_args) {
            return Err(FrameError::UnexpectedArgumentCount);
        }

        let operation = match self.take_bulk("operation")? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let kind = match operation {
            b"GET" => Kind::Get,
            b"SET" => Kind::Set,
            b"DEL" => Kind::Del,
            _ => return Err(FrameError::UnknownOperation),
        };

        let key = match self.take_bulk("key")? {
            Some(bytes) => bytes.to_vec(),
            None => return Ok(None),
        };
        if key.is_empty() {
            return Err(FrameError::EmptyKey);
        }

        let command = match kind {
            Kind::Set => {
                if num_args != 3 {
                    return Err(FrameError::SetRequiresValue);
                }
                let value = match self.take_bulk("value")? {
                    Some(bytes) => bytes.to_vec(),
                    None => return Ok(None),
                };
                Command::Set { key, value }
            }
            Kind::Get => {
                if num_args > 2 {
                    return Err(FrameError::TooManyArguments);
                }
                Command::Get { key }
            }
            Kind::Del => {
                if num_args > 2 {
                    return Err(FrameError::TooManyArguments);
                }
                Command::Del { key }
            }
        };

        Ok(Some(command))
    }

    /// Consume one bulk string: `$<len>\r\n<len bytes>\r\n`
    fn take_bulk(&mut self, what: &'static str) -> Result<Option<&'a [u8]>, FrameError> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        if self.input[self.pos] != b'$' {
            return Err(FrameError::MissingBulkMarker(what));
        }
        self.pos += 1;

        let header = match self.take_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let len = parse_decimal(header).ok_or(FrameError::InvalidBulkLength(what))?;
        let framed = len
            .checked_add(2)
            .ok_or(FrameError::InvalidBulkLength(what))?;

        if self.input.len() - self.pos < framed {
            return Ok(None);
        }
        let payload = &self.input[self.pos..self.pos + len];
        if &self.input[self.pos + len..self.pos + len + 2] != b"\r\n" {
            return Err(FrameError::TruncatedBulk(what));
        }
        self.pos += len + 2;

        Ok(Some(payload))
    }

    /// Consume bytes up to the next CRLF, exclusive. `Ok(None)` when no CRLF
    /// has arrived yet.
    fn take_line(&mut self) -> Result<Option<&'a [u8]>, FrameError> {
        let rest = &self.input[self.pos..];
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(at) => {
                self.pos += at + 2;
                Ok(Some(&rest[..at]))
            }
            None => Ok(None),
        }
    }
}

enum Kind {
    Get,
    Set,
    Del,
}

/// Parse a non-empty, all-digit decimal. Rejects signs, so negative-looking
/// lengths fail here.
fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
