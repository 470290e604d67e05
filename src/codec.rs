//! Line framing for the chat protocol
//!
//! Wraps `LinesCodec` so that oversized and non-UTF-8 lines become inbound
//! events instead of stream errors. A `FramedRead` that yields an error
//! pauses the stream, which would look like a disconnect to the session loop.

use std::io;

use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Default maximum inbound line length in bytes
pub const MAX_LINE_LENGTH: usize = 4096;

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line, newline (and trailing `\r`) stripped
    Line(String),
    /// A line longer than the limit; its bytes are discarded up to the next newline
    TooLong,
    /// A line that was not valid UTF-8
    InvalidUtf8,
}

/// Newline-delimited codec with a bounded inbound line length
#[derive(Debug, Clone)]
pub struct ChatCodec {
    inner: LinesCodec,
    max_length: usize,
}

impl ChatCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn lift(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Inbound>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(Inbound::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Inbound::TooLong)),
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Inbound::InvalidUtf8))
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl Decoder for ChatCodec {
    type Item = Inbound;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, LinesCodecError> {
        Self::lift(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, LinesCodecError> {
        Self::lift(self.inner.decode_eof(buf))
    }
}

impl Encoder<String> for ChatCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.inner.encode(line, dst)
    }
}
