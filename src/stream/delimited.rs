//! In-band delimited codec
//!
//! Text is written verbatim; every other event is written as its JSON
//! payload wrapped in [`OPEN`] and [`CLOSE`]. Both delimiters contain the
//! ASCII record separator [`SENTINEL`], which therefore never appears raw in
//! encoded text: a literal sentinel in a text fragment is written as
//! [`ESCAPE`]. JSON payloads cannot contain a raw sentinel because control
//! characters are always escaped inside JSON strings.
//!
//! Decoding leaves incomplete input in the buffer (a partial delimiter, an
//! unterminated envelope or a split UTF-8 sequence), so the decoded output
//! does not depend on how the bytes were chunked.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RelayError;
use crate::stream::event::StreamEvent;

/// Record separator byte that starts every control sequence.
pub const SENTINEL: u8 = 0x1e;
/// Start of an event envelope.
pub const OPEN: &str = "\u{1e}<evt>";
/// End of an event envelope.
pub const CLOSE: &str = "</evt>\u{1e}";
/// Escaped literal sentinel inside text.
pub const ESCAPE: &str = "\u{1e}<esc>";

/// Encoder/decoder for the delimited wire format.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use toolrelay::stream::{DelimitedCodec, StreamEvent};
///
/// let mut codec = DelimitedCodec::default();
/// let mut buf = BytesMut::new();
/// codec.encode(StreamEvent::text("Hi"), &mut buf).unwrap();
/// codec.encode(StreamEvent::call_start("s1__search", serde_json::json!({})), &mut buf).unwrap();
///
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(StreamEvent::text("Hi")));
/// assert!(matches!(codec.decode(&mut buf).unwrap(), Some(StreamEvent::CallStart { .. })));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedCodec;

impl Encoder<StreamEvent> for DelimitedCodec {
    type Error = RelayError;

    fn encode(&mut self, item: StreamEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StreamEvent::Text { text } => {
                dst.reserve(text.len());
                for (i, part) in text.split('\u{1e}').enumerate() {
                    if i > 0 {
                        dst.put_slice(ESCAPE.as_bytes());
                    }
                    dst.put_slice(part.as_bytes());
                }
            }
            event => {
                let payload = serde_json::to_vec(&event)?;
                dst.reserve(OPEN.len() + payload.len() + CLOSE.len());
                dst.put_slice(OPEN.as_bytes());
                dst.put_slice(&payload);
                dst.put_slice(CLOSE.as_bytes());
            }
        }
        Ok(())
    }
}

impl Decoder for DelimitedCodec {
    type Item = StreamEvent;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        Ok(next_item(src, false))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, RelayError> {
        Ok(next_item(src, true))
    }
}

/// Extract the next complete item from `buf`.
///
/// With `eof` set, retained partial input is flushed as text.
fn next_item(buf: &mut BytesMut, eof: bool) -> Option<StreamEvent> {
    loop {
        if buf.is_empty() {
            return None;
        }

        match buf.iter().position(|b| *b == SENTINEL) {
            Some(0) => {}
            Some(pos) => {
                let text = buf.split_to(pos);
                return Some(StreamEvent::text(String::from_utf8_lossy(&text)));
            }
            None => return take_plain_text(buf, eof),
        }

        // The buffer starts with a sentinel.
        if buf.starts_with(OPEN.as_bytes()) {
            let Some(end) = find(&buf[OPEN.len()..], CLOSE.as_bytes()) else {
                return eof.then(|| flush_all(buf));
            };
            let envelope = buf.split_to(OPEN.len() + end + CLOSE.len());
            let payload = &envelope[OPEN.len()..OPEN.len() + end];
            match serde_json::from_slice::<StreamEvent>(payload) {
                Ok(event) => return Some(event),
                Err(e) => {
                    tracing::warn!(
                        "dropping stream envelope with unreadable payload: {e}: {}",
                        String::from_utf8_lossy(payload)
                    );
                    continue;
                }
            }
        }

        if buf.starts_with(ESCAPE.as_bytes()) {
            buf.advance(ESCAPE.len());
            return Some(StreamEvent::text("\u{1e}"));
        }

        let could_grow =
            OPEN.as_bytes().starts_with(&buf[..]) || ESCAPE.as_bytes().starts_with(&buf[..]);
        if could_grow {
            return eof.then(|| flush_all(buf));
        }

        // Stray sentinel that cannot start a control sequence.
        buf.advance(1);
        return Some(StreamEvent::text("\u{1e}"));
    }
}

/// Take sentinel-free text, keeping an incomplete UTF-8 tail unless at EOF.
fn take_plain_text(buf: &mut BytesMut, eof: bool) -> Option<StreamEvent> {
    let take = match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(e) if e.error_len().is_none() && !eof => e.valid_up_to(),
        Err(_) => buf.len(),
    };
    if take == 0 {
        return None;
    }
    let text = buf.split_to(take);
    Some(StreamEvent::text(String::from_utf8_lossy(&text)))
}

fn flush_all(buf: &mut BytesMut) -> StreamEvent {
    let rest = buf.split();
    StreamEvent::text(String::from_utf8_lossy(&rest))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
