//! Wire-level stream codec tests
//!
//! Every encoded stream must decode to the same text, call table and
//! truncation state no matter where the bytes are split.

use bytes::BytesMut;
use serde_json::json;
use tokio_util::codec::{Decoder, Encoder};

use toolrelay::stream::{
    CallStatus, DelimitedCodec, EventCodec, FramedEventCodec, StreamDecoder, StreamEvent,
};

fn conversation() -> Vec<StreamEvent> {
    vec![
        StreamEvent::text("Looking up caf\u{e9} prices "),
        StreamEvent::text("\u{1f375} now."),
        StreamEvent::call_start("menu__search", json!({ "q": "caf\u{e9}" })),
        StreamEvent::call_start("menu__price", json!({ "item": "tea" })),
        StreamEvent::call_result("menu__price", Ok(json!({ "price": 3 }))),
        StreamEvent::call_result("menu__search", Err("index offline".to_string())),
        StreamEvent::text("Tea is 3, record\u{1e}separator kept."),
        StreamEvent::Truncated { rounds: 2 },
    ]
}

fn encode(codec: &mut EventCodec, events: Vec<StreamEvent>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for event in events {
        codec.encode(event, &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Decode `bytes` split at `cuts` and return the decoder's final view.
fn decode_split<C>(decoder: &mut StreamDecoder<C>, bytes: &[u8], cuts: &[usize])
where
    C: Decoder<Item = StreamEvent, Error = toolrelay::RelayError>,
{
    let mut start = 0;
    for &cut in cuts {
        decoder.push(&bytes[start..cut]);
        start = cut;
    }
    decoder.push(&bytes[start..]);
    decoder.finish();
}

#[test]
fn test_hello_world_example() {
    let wire = "Hello\u{1e}<evt>{\"type\":\"call_start\",\"name\":\"s1__search\",\"arguments\":{}}</evt>\u{1e}World";

    let mut whole = StreamDecoder::default();
    whole.push(wire.as_bytes());
    whole.finish();
    assert_eq!(whole.text(), "HelloWorld");
    assert_eq!(whole.calls().len(), 1);
    assert_eq!(whole.calls()[0].status, CallStatus::Pending);

    for cut in 0..=wire.len() {
        let mut split = StreamDecoder::default();
        decode_split(&mut split, wire.as_bytes(), &[cut]);
        assert_eq!(split.text(), "HelloWorld", "split at {cut}");
        assert_eq!(split.calls(), whole.calls(), "split at {cut}");
    }
}

#[test]
fn test_delimited_every_two_way_split() {
    let bytes = encode(&mut EventCodec::select(false), conversation());

    let mut reference = StreamDecoder::default();
    reference.push(&bytes);
    reference.finish();
    assert_eq!(
        reference.text(),
        "Looking up caf\u{e9} prices \u{1f375} now.Tea is 3, record\u{1e}separator kept."
    );
    assert_eq!(reference.calls().len(), 2);
    assert_eq!(reference.calls()[0].status, CallStatus::Error);
    assert_eq!(reference.calls()[0].error.as_deref(), Some("index offline"));
    assert_eq!(reference.calls()[1].status, CallStatus::Success);
    assert_eq!(reference.calls()[1].result, Some(json!({ "price": 3 })));
    assert_eq!(reference.truncated(), Some(2));

    for cut in 0..=bytes.len() {
        let mut split = StreamDecoder::default();
        decode_split(&mut split, &bytes, &[cut]);
        assert_eq!(split.text(), reference.text(), "split at {cut}");
        assert_eq!(split.calls(), reference.calls(), "split at {cut}");
        assert_eq!(split.truncated(), reference.truncated(), "split at {cut}");
    }
}

#[test]
fn test_framed_byte_at_a_time() {
    let bytes = encode(&mut EventCodec::select(true), conversation());

    let mut reference = StreamDecoder::new(FramedEventCodec::default());
    reference.push(&bytes);
    reference.finish();

    let cuts: Vec<usize> = (1..bytes.len()).collect();
    let mut split = StreamDecoder::new(FramedEventCodec::default());
    decode_split(&mut split, &bytes, &cuts);

    assert_eq!(split.text(), reference.text());
    assert_eq!(split.calls(), reference.calls());
    assert_eq!(split.truncated(), Some(2));
}

#[test]
fn test_both_formats_agree() {
    let delimited = encode(&mut EventCodec::select(false), conversation());
    let framed = encode(&mut EventCodec::select(true), conversation());

    let mut a = StreamDecoder::default();
    decode_split(&mut a, &delimited, &[7, 40, 41, 90]);
    let mut b = StreamDecoder::new(FramedEventCodec::default());
    decode_split(&mut b, &framed, &[7, 40, 41, 90]);

    assert_eq!(a.text(), b.text());
    assert_eq!(a.calls(), b.calls());
    assert_eq!(a.truncated(), b.truncated());
}

#[test]
fn test_split_multibyte_text_is_never_mangled() {
    let text = "\u{1f375}\u{e9}\u{4e2d}";
    let mut buf = BytesMut::new();
    DelimitedCodec.encode(StreamEvent::text(text), &mut buf).unwrap();

    for cut in 0..=buf.len() {
        let mut decoder = StreamDecoder::default();
        decode_split(&mut decoder, &buf, &[cut]);
        assert_eq!(decoder.text(), text, "split at {cut}");
    }
}

#[test]
fn test_incomplete_trailing_envelope_is_flushed_as_text() {
    let wire = "done\u{1e}<evt>{\"type\":\"trunc";
    let mut decoder = StreamDecoder::default();
    decoder.push(wire.as_bytes());
    assert_eq!(decoder.text(), "done");

    decoder.finish();
    assert_eq!(decoder.text(), wire);
    assert_eq!(decoder.truncated(), None);
}
