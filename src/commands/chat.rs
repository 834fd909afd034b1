//! Single-message chat handler
//!
//! Connects the configured servers, runs the agentic loop for one message
//! and writes the encoded event stream to stdout as events are produced.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;

use super::{build_registry, connect_servers};
use crate::agent::{AgenticLoop, ChatRequest, FinishReason};
use crate::config::Config;
use crate::error::{Result, RelayError};
use crate::providers::create_provider;
use crate::stream::{EventCodec, StreamEvent};

/// Events buffered between the loop and the writer
const EVENT_BUFFER: usize = 64;

/// Run one chat request
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `message` - The user's message
/// * `no_tools` - Skip server connections and offer no tools
/// * `framed` - Write NDJSON events instead of the delimited stream
///
/// # Errors
///
/// Returns error if the provider cannot be created, the model stream fails,
/// or stdout cannot be written
pub async fn run_chat(config: Config, message: String, no_tools: bool, framed: bool) -> Result<()> {
    let provider = create_provider(&config.provider)?;
    let registry = build_registry(&config);

    if !no_tools {
        let failures = connect_servers(&registry, &config.mcp.servers).await;
        for (server, detail) in &failures {
            eprintln!("warning: server {} unavailable: {}", server, detail);
        }
    }

    let agent = AgenticLoop::new(provider, registry.clone(), config.agent)?;
    let request = if no_tools {
        ChatRequest::new(message).without_tools()
    } else {
        ChatRequest::new(message)
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let writer = tokio::spawn(write_events(rx, EventCodec::select(framed), tokio::io::stdout()));

    let outcome = agent.run(request, tx).await;
    let written = writer.await;
    registry.disconnect_all().await;

    match written {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => return Err(RelayError::Stream(format!("writer task failed: {}", e)).into()),
    }

    let outcome = outcome?;
    match outcome.finish {
        FinishReason::MaxRounds => eprintln!(
            "\nnote: reply truncated after {} rounds",
            outcome.rounds
        ),
        FinishReason::Cancelled => tracing::info!("Output closed before the reply finished"),
        FinishReason::Complete => {}
    }
    tracing::info!(
        rounds = outcome.rounds,
        calls = outcome.calls.len(),
        "Chat finished"
    );
    Ok(())
}

/// Encode events from `rx` onto `out`, flushing after each one.
///
/// Returns the writer once the channel closes.
pub async fn write_events<W>(
    mut rx: mpsc::Receiver<StreamEvent>,
    codec: EventCodec,
    out: W,
) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(out, codec);
    while let Some(event) = rx.recv().await {
        sink.send(event).await?;
    }
    sink.flush().await?;
    Ok(sink.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{FramedEventCodec, StreamDecoder};

    async fn written(framed: bool) -> Vec<u8> {
        let (tx, rx) = mpsc::channel(8);
        let writer = tokio::spawn(write_events(rx, EventCodec::select(framed), Vec::new()));
        tx.send(StreamEvent::text("Hello")).await.unwrap();
        tx.send(StreamEvent::call_start("s1__search", serde_json::json!({})))
            .await
            .unwrap();
        tx.send(StreamEvent::text("World")).await.unwrap();
        drop(tx);
        writer.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_write_events_delimited() {
        let bytes = written(false).await;
        let mut decoder = StreamDecoder::default();
        decoder.push(&bytes);
        decoder.finish();
        assert_eq!(decoder.text(), "HelloWorld");
        assert_eq!(decoder.calls()[0].name, "s1__search");
    }

    #[tokio::test]
    async fn test_write_events_framed() {
        let bytes = written(true).await;
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 3);
        let mut decoder = StreamDecoder::new(FramedEventCodec::default());
        decoder.push(&bytes);
        decoder.finish();
        assert_eq!(decoder.text(), "HelloWorld");
    }

    #[tokio::test]
    async fn test_write_events_exact_bytes() {
        let out = tokio_test::io::Builder::new()
            .write(b"Hi")
            .write("\u{1e}<evt>{\"type\":\"truncated\",\"rounds\":1}</evt>\u{1e}".as_bytes())
            .build();

        let (tx, rx) = mpsc::channel(8);
        tx.send(StreamEvent::text("Hi")).await.unwrap();
        tx.send(StreamEvent::Truncated { rounds: 1 }).await.unwrap();
        drop(tx);

        // The mock panics on drop if any expected write is missing.
        let out = write_events(rx, EventCodec::select(false), out).await.unwrap();
        drop(out);
    }
}
