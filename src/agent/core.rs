//! Agentic loop implementation
//!
//! This module implements the loop that alternates between model generation
//! and tool execution:
//! - Streams each generation, forwarding text as it arrives
//! - Executes requested tool calls concurrently, isolating failures
//! - Feeds results back as the next round's input
//! - Stops when the model is done, the round limit is hit or the consumer
//!   goes away

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::conversation::{ChatRequest, FinishReason, LoopOutcome, LoopState};
use super::executor::ToolExecutor;
use crate::config::LoopConfig;
use crate::error::{relay_error, Result, RelayError};
use crate::mcp::{tool_display_name, QualifiedToolName};
use crate::providers::{FunctionInvocation, GenerateRequest, ModelProvider};
use crate::stream::{format_tool_result, StreamEvent};

/// What one generation produced
#[derive(Debug, Default)]
struct RoundReply {
    text: String,
    calls: Vec<FunctionInvocation>,
}

/// Drives the model/tool round trip for one request at a time.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use toolrelay::agent::{AgenticLoop, ChatRequest};
/// use toolrelay::config::LoopConfig;
/// use toolrelay::mcp::ConnectionRegistry;
///
/// # async fn example() -> toolrelay::error::Result<()> {
/// # let provider = unimplemented!();
/// let registry = Arc::new(ConnectionRegistry::default());
/// let agent = AgenticLoop::new(provider, registry, LoopConfig::default())?;
/// let (tx, mut rx) = mpsc::channel(64);
/// let run = tokio::spawn(async move { agent.run(ChatRequest::new("hi"), tx).await });
/// while let Some(event) = rx.recv().await {
///     println!("{:?}", event);
/// }
/// let outcome = run.await??;
/// # Ok(())
/// # }
/// ```
pub struct AgenticLoop {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<dyn ToolExecutor>,
    config: LoopConfig,
}

impl AgenticLoop {
    /// Creates a new loop
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if `max_rounds` is zero
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: Arc<dyn ToolExecutor>,
        config: LoopConfig,
    ) -> Result<Self> {
        if config.max_rounds == 0 {
            return Err(RelayError::Config("max_rounds must be greater than 0".to_string()).into());
        }
        Ok(Self {
            provider,
            tools,
            config,
        })
    }

    /// Run one request, emitting events on `sink` in order.
    ///
    /// The channel closes when this returns. Reaching the round limit is
    /// not an error: a `truncated` event is emitted and the outcome reports
    /// [`FinishReason::MaxRounds`]. Dropping the receiver cancels the run
    /// before the next fragment or round.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Stream` if the model stream fails; an
    /// `[Error: ...]` text event is emitted first.
    pub async fn run(
        &self,
        request: ChatRequest,
        sink: mpsc::Sender<StreamEvent>,
    ) -> Result<LoopOutcome> {
        let ChatRequest {
            message,
            history,
            tools_enabled,
        } = request;

        let declarations = if tools_enabled {
            self.tools.declarations().await
        } else {
            Vec::new()
        };
        let max_rounds = self.config.max_rounds;
        info!(
            model = %self.provider.model_name(),
            tools = declarations.len(),
            max_rounds,
            "Starting agentic loop"
        );

        let mut state = LoopState::new(history);
        let mut input = message;

        loop {
            if sink.is_closed() {
                info!(rounds = state.rounds(), "Consumer gone, stopping");
                return Ok(state.into_outcome(FinishReason::Cancelled));
            }

            let round = state.begin_round();
            debug!("Round {}/{}", round, max_rounds);

            let request = GenerateRequest {
                history: state.turns().to_vec(),
                input: input.clone(),
                tools: declarations.clone(),
            };

            let reply = match self.generate(request, &sink, &mut state).await {
                Ok(Some(reply)) => reply,
                Ok(None) => {
                    info!(rounds = round, "Consumer gone, stopping");
                    return Ok(state.into_outcome(FinishReason::Cancelled));
                }
                Err(e) => {
                    let message = failure_message(&e);
                    warn!("Model stream failed in round {}: {}", round, message);
                    let notice = format!("\n\n[Error: {}]", message);
                    state.push_text(&notice);
                    if sink.send(StreamEvent::text(notice)).await.is_err() {
                        debug!("Error notice not delivered, consumer gone");
                    }
                    return Err(RelayError::Stream(message).into());
                }
            };

            let RoundReply { text, calls } = reply;

            if calls.is_empty() {
                state.record_exchange(input, text, Vec::new());
                info!(rounds = round, "Agentic loop complete");
                return Ok(state.into_outcome(FinishReason::Complete));
            }

            if !tools_enabled {
                warn!(
                    "Ignoring {} function call(s) requested with tools disabled",
                    calls.len()
                );
                state.record_exchange(input, text, Vec::new());
                return Ok(state.into_outcome(FinishReason::Complete));
            }

            debug!("Executing {} tool calls", calls.len());
            state.record_exchange(input, text, calls.clone());
            let base = state.start_calls(&calls);
            if !self.execute_calls(&calls, base, &sink, &mut state).await {
                info!(rounds = round, "Consumer gone during tool execution");
                return Ok(state.into_outcome(FinishReason::Cancelled));
            }
            input = state.results_input(base);

            if round >= max_rounds {
                warn!("Round limit ({}) reached, truncating reply", max_rounds);
                if sink
                    .send(StreamEvent::Truncated { rounds: round })
                    .await
                    .is_err()
                {
                    debug!("Truncation notice not delivered, consumer gone");
                }
                return Ok(state.into_outcome(FinishReason::MaxRounds));
            }
        }
    }

    /// Stream one generation. `Ok(None)` means the consumer went away.
    async fn generate(
        &self,
        request: GenerateRequest,
        sink: &mpsc::Sender<StreamEvent>,
        state: &mut LoopState,
    ) -> Result<Option<RoundReply>> {
        let mut stream = self.provider.stream(request).await?;
        let mut reply = RoundReply::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return Ok(None),
                next = stream.next() => next,
            };
            let Some(fragment) = next else {
                break;
            };
            let fragment = fragment?;

            if !fragment.text.is_empty() {
                state.push_text(&fragment.text);
                reply.text.push_str(&fragment.text);
                if sink.send(StreamEvent::text(fragment.text)).await.is_err() {
                    return Ok(None);
                }
            }
            reply.calls.extend(fragment.function_calls);
        }

        Ok(Some(reply))
    }

    /// Run a batch of calls concurrently. Returns false if the consumer
    /// went away; calls still in flight then finish detached.
    async fn execute_calls(
        &self,
        calls: &[FunctionInvocation],
        base: usize,
        sink: &mpsc::Sender<StreamEvent>,
        state: &mut LoopState,
    ) -> bool {
        for call in calls {
            let event = StreamEvent::call_start(call.name.clone(), call.arguments.clone());
            if sink.send(event).await.is_err() {
                return false;
            }
        }

        let mut pending: FuturesUnordered<_> = calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                let tools = Arc::clone(&self.tools);
                let name = call.name.clone();
                let arguments = call.arguments.clone();
                let task =
                    tokio::spawn(async move { invoke(tools.as_ref(), &name, arguments).await });
                async move { (index, task.await) }
            })
            .collect();

        while let Some((index, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| Err(format!("tool task failed: {}", e)));
            let name = calls[index].name.clone();
            match &outcome {
                Ok(value) => debug!(
                    tool = %tool_display_name(&name),
                    "Tool call succeeded: {}",
                    format_tool_result(value)
                ),
                Err(message) => warn!(tool = %name, "Tool call failed: {}", message),
            }
            state.settle_call(base + index, outcome.clone());
            if sink.send(StreamEvent::call_result(name, outcome)).await.is_err() {
                return false;
            }
        }
        true
    }
}

/// Resolve and execute one call, folding every failure into its message.
async fn invoke(
    tools: &dyn ToolExecutor,
    name: &str,
    arguments: Value,
) -> std::result::Result<Value, String> {
    let qualified: QualifiedToolName = name.parse().map_err(|e| failure_message(&e))?;
    tools
        .execute(&qualified, arguments)
        .await
        .map_err(|e| failure_message(&e))
}

/// The message a failure is reported with, without the variant prefix for
/// the kinds whose message already says what happened.
fn failure_message(err: &anyhow::Error) -> String {
    match relay_error(err) {
        Some(RelayError::ToolInvocation(message))
        | Some(RelayError::Stream(message))
        | Some(RelayError::Provider(message)) => message.clone(),
        _ => format!("{:#}", err),
    }
}
