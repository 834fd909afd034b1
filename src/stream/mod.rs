//! Stream codec
//!
//! Model text and out-of-band events (tool call starts, tool results,
//! truncation) share one ordered byte channel. Two wire formats exist:
//!
//! - [`DelimitedCodec`] -- text verbatim, events wrapped in in-band
//!   delimiters
//! - [`FramedEventCodec`] -- one JSON event per line
//!
//! [`EventCodec`] selects between them at runtime and [`StreamDecoder`] is
//! the consuming end.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RelayError;

pub mod decoder;
pub mod delimited;
pub mod event;
pub mod framed;

pub use decoder::StreamDecoder;
pub use delimited::DelimitedCodec;
pub use event::{format_tool_result, CallStatus, FunctionCallRecord, StreamEvent};
pub use framed::FramedEventCodec;

/// Either wire format.
#[derive(Debug, Clone)]
pub enum EventCodec {
    /// In-band delimiters.
    Delimited(DelimitedCodec),
    /// Newline-delimited JSON.
    Framed(FramedEventCodec),
}

impl EventCodec {
    /// The NDJSON codec when `framed` is set, the delimited one otherwise.
    pub fn select(framed: bool) -> Self {
        if framed {
            Self::Framed(FramedEventCodec::default())
        } else {
            Self::Delimited(DelimitedCodec)
        }
    }
}

impl Encoder<event::StreamEvent> for EventCodec {
    type Error = RelayError;

    fn encode(&mut self, item: StreamEvent, dst: &mut BytesMut) -> Result<(), RelayError> {
        match self {
            Self::Delimited(codec) => codec.encode(item, dst),
            Self::Framed(codec) => codec.encode(item, dst),
        }
    }
}

impl Decoder for EventCodec {
    type Item = StreamEvent;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        match self {
            Self::Delimited(codec) => codec.decode(src),
            Self::Framed(codec) => codec.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        match self {
            Self::Delimited(codec) => codec.decode_eof(src),
            Self::Framed(codec) => codec.decode_eof(src),
        }
    }
}
