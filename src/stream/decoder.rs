//! Incremental consumer of an encoded event stream
//!
//! [`StreamDecoder`] accepts byte chunks of any size, decodes them with a
//! codec, and keeps the running view a client needs: the accumulated text,
//! the function-call table and whether the reply was truncated.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::RelayError;
use crate::stream::delimited::DelimitedCodec;
use crate::stream::event::{CallStatus, FunctionCallRecord, StreamEvent};

/// Chunk-invariant stream decoder.
///
/// # Examples
///
/// ```
/// use toolrelay::stream::StreamDecoder;
///
/// let wire = "Hello\u{1e}<evt>{\"type\":\"call_start\",\"name\":\"s1__search\",\"arguments\":{}}</evt>\u{1e}World";
/// let mut decoder = StreamDecoder::default();
/// for byte in wire.as_bytes() {
///     decoder.push(std::slice::from_ref(byte));
/// }
/// decoder.finish();
/// assert_eq!(decoder.text(), "HelloWorld");
/// assert_eq!(decoder.calls()[0].name, "s1__search");
/// ```
#[derive(Debug)]
pub struct StreamDecoder<C = DelimitedCodec> {
    codec: C,
    buffer: BytesMut,
    text: String,
    calls: Vec<FunctionCallRecord>,
    truncated: Option<u32>,
}

impl Default for StreamDecoder<DelimitedCodec> {
    fn default() -> Self {
        Self::new(DelimitedCodec)
    }
}

impl<C> StreamDecoder<C>
where
    C: Decoder<Item = StreamEvent, Error = RelayError>,
{
    /// Decoder using `codec` to split the byte stream.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            buffer: BytesMut::new(),
            text: String::new(),
            calls: Vec::new(),
            truncated: None,
        }
    }

    /// Feed a chunk and return the events it completed.
    ///
    /// Adjacent text fragments are merged.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        self.drain(false)
    }

    /// Flush anything still buffered. Call once the stream has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.drain(true)
    }

    fn drain(&mut self, eof: bool) -> Vec<StreamEvent> {
        let mut events: Vec<StreamEvent> = Vec::new();
        loop {
            let next = if eof {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("discarding undecodable stream input: {e}");
                    self.buffer.clear();
                    break;
                }
            };

            self.apply(&event);
            match event {
                StreamEvent::Text { text } => match events.last_mut() {
                    Some(StreamEvent::Text { text: last }) => last.push_str(&text),
                    _ => events.push(StreamEvent::Text { text }),
                },
                other => events.push(other),
            }
        }
        events
    }

    fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Text { text } => self.text.push_str(text),
            StreamEvent::CallStart { name, arguments } => self
                .calls
                .push(FunctionCallRecord::pending(name.clone(), arguments.clone())),
            StreamEvent::CallResult {
                name,
                result,
                error,
            } => {
                let pending = self
                    .calls
                    .iter_mut()
                    .find(|c| c.name == *name && c.status == CallStatus::Pending);
                match pending {
                    Some(record) => {
                        let outcome = match error {
                            Some(message) => Err(message.clone()),
                            None => Ok(result.clone().unwrap_or(serde_json::Value::Null)),
                        };
                        record.settle(outcome);
                    }
                    None => tracing::debug!(name = %name, "call_result with no pending call"),
                }
            }
            StreamEvent::Truncated { rounds } => self.truncated = Some(*rounds),
        }
    }

    /// Text decoded so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Function calls seen so far, in request order.
    pub fn calls(&self) -> &[FunctionCallRecord] {
        &self.calls
    }

    /// Round count if the reply was cut off at the round limit.
    pub fn truncated(&self) -> Option<u32> {
        self.truncated
    }
}
