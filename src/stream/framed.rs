//! Newline-delimited JSON codec
//!
//! One serialized [`StreamEvent`] per line, text included. Compact JSON never
//! contains a raw newline, so lines need no escaping. Framing is handled by
//! [`LinesCodec`] with a per-line length limit.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::RelayError;
use crate::stream::event::StreamEvent;

/// Longest accepted line, in bytes.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// NDJSON encoder/decoder for stream events.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use toolrelay::stream::{FramedEventCodec, StreamEvent};
///
/// let mut codec = FramedEventCodec::default();
/// let mut buf = BytesMut::new();
/// codec.encode(StreamEvent::text("Hi"), &mut buf).unwrap();
/// assert_eq!(&buf[..], b"{\"type\":\"text\",\"text\":\"Hi\"}\n");
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(StreamEvent::text("Hi")));
/// ```
#[derive(Debug, Clone)]
pub struct FramedEventCodec {
    lines: LinesCodec,
}

impl Default for FramedEventCodec {
    fn default() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

fn line_error(e: LinesCodecError) -> RelayError {
    match e {
        LinesCodecError::Io(io) => RelayError::Io(io),
        LinesCodecError::MaxLineLengthExceeded => {
            RelayError::Stream(format!("event line exceeds {MAX_LINE_LENGTH} bytes"))
        }
    }
}

impl Encoder<StreamEvent> for FramedEventCodec {
    type Error = RelayError;

    fn encode(&mut self, item: StreamEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = serde_json::to_string(&item)?;
        self.lines.encode(line, dst).map_err(line_error)
    }
}

impl FramedEventCodec {
    fn parse(line: &str) -> Option<StreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("dropping unreadable event line: {e}");
                None
            }
        }
    }
}

impl Decoder for FramedEventCodec {
    type Item = StreamEvent;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        while let Some(line) = self.lines.decode(src).map_err(line_error)? {
            if let Some(event) = Self::parse(&line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        while let Some(line) = self.lines.decode_eof(src).map_err(line_error)? {
            if let Some(event) = Self::parse(&line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}
