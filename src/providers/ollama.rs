//! Ollama provider implementation for Toolrelay
//!
//! This module implements [`ModelProvider`] for Ollama, connecting to a local
//! or remote Ollama server and streaming `/api/chat` replies. Ollama streams
//! newline-delimited JSON objects; each object's `message.content` becomes a
//! text fragment and each `message.tool_calls` entry becomes a function call.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use crate::config::OllamaConfig;
use crate::error::{Result, RelayError};
use crate::providers::{
    Fragment, FragmentStream, FunctionInvocation, GenerateRequest, ModelProvider, ToolDeclaration,
    Turn,
};

/// Longest NDJSON line accepted from Ollama.
const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use futures::StreamExt;
/// use toolrelay::config::OllamaConfig;
/// use toolrelay::providers::{GenerateRequest, ModelProvider, OllamaProvider};
///
/// # async fn example() -> toolrelay::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let request = GenerateRequest {
///     input: "Hello!".to_string(),
///     ..Default::default()
/// };
/// let mut stream = provider.stream(request).await?;
/// while let Some(fragment) = stream.next().await {
///     print!("{}", fragment?.text);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Tool definition for Ollama API
#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

/// Function definition for Ollama tools
#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

/// Function call details in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// One line of a streamed `/api/chat` reply
#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Arguments
    ///
    /// * `config` - Ollama configuration containing host and model
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use toolrelay::config::OllamaConfig;
    /// use toolrelay::providers::OllamaProvider;
    ///
    /// let config = OllamaConfig {
    ///     host: "http://localhost:11434".to_string(),
    ///     model: "llama3.2:latest".to_string(),
    /// };
    /// let provider = OllamaProvider::new(config);
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("toolrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn convert_turns(history: &[Turn], input: &str) -> Vec<OllamaMessage> {
        let mut messages: Vec<OllamaMessage> = history
            .iter()
            .filter(|t| !t.content.is_empty() || !t.function_calls.is_empty())
            .map(|t| OllamaMessage {
                role: t.role.clone(),
                content: t.content.clone(),
                tool_calls: (!t.function_calls.is_empty()).then(|| {
                    t.function_calls
                        .iter()
                        .map(|c| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                }),
            })
            .collect();

        if !input.is_empty() {
            messages.push(OllamaMessage {
                role: "user".to_string(),
                content: input.to_string(),
                tool_calls: None,
            });
        }
        messages
    }

    fn convert_tools(tools: &[ToolDeclaration]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function".to_string(),
                function: OllamaFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

/// Convert one NDJSON line into a fragment.
///
/// Returns `Ok(None)` for lines that carry nothing (blank lines, the final
/// `done` record).
fn parse_line(line: &str) -> Result<Option<Fragment>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let chunk: OllamaChunk = serde_json::from_str(line)
        .map_err(|e| RelayError::Provider(format!("Failed to parse Ollama stream line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(RelayError::Provider(format!("Ollama stream error: {}", error)).into());
    }
    if chunk.done {
        tracing::debug!("Ollama stream done: eval_count={}", chunk.eval_count);
    }

    let Some(message) = chunk.message else {
        return Ok(None);
    };
    let function_calls: Vec<FunctionInvocation> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| FunctionInvocation::new(tc.function.name, tc.function.arguments))
        .collect();

    if message.content.is_empty() && function_calls.is_empty() {
        return Ok(None);
    }
    Ok(Some(Fragment {
        text: message.content,
        function_calls,
    }))
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn stream(&self, request: GenerateRequest) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let ollama_request = OllamaRequest {
            model: self.config.model.clone(),
            messages: Self::convert_turns(&request.history, &request.input),
            tools: Self::convert_tools(&request.tools),
            stream: true,
        };

        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                RelayError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(RelayError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        );

        let fragments = lines.filter_map(|line| async move {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(RelayError::Provider(format!(
                        "Ollama stream interrupted: {}",
                        e
                    ))
                    .into()))
                }
            };
            parse_line(&line).transpose()
        });

        Ok(Box::pin(fragments))
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(host: &str) -> OllamaProvider {
        OllamaProvider::new(OllamaConfig {
            host: host.to_string(),
            model: "llama3.2:latest".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_ollama_provider_accessors() {
        let provider = provider_for("http://localhost:11434");
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.model(), "llama3.2:latest");
        assert_eq!(provider.model_name(), "llama3.2:latest");
    }

    #[test]
    fn test_convert_turns_appends_input() {
        let history = vec![
            Turn::user("first"),
            Turn::assistant(
                "",
                vec![FunctionInvocation::new("s1__search", serde_json::json!({ "q": "x" }))],
            ),
            Turn::assistant("", vec![]),
        ];
        let messages = OllamaProvider::convert_turns(&history, "next");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        let calls = messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "s1__search");
        assert_eq!(messages[2].content, "next");
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![ToolDeclaration {
            name: "files__read".into(),
            description: "Read".into(),
            parameters: serde_json::json!({ "type": "object" }),
        }];
        let converted = OllamaProvider::convert_tools(&tools);
        assert_eq!(converted[0].r#type, "function");
        assert_eq!(converted[0].function.name, "files__read");
    }

    #[test]
    fn test_parse_line_text_and_calls() {
        let text = parse_line(r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(text, Fragment::text("Hi"));

        let calls = parse_line(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"s1__a","arguments":{"k":1}}}]},"done":false}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(calls.function_calls[0].name, "s1__a");
        assert_eq!(calls.function_calls[0].arguments["k"], 1);
    }

    #[test]
    fn test_parse_line_skips_done_and_blank() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line(
            r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":5}"#
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn test_parse_line_error_record() {
        let err = parse_line(r#"{"error":"model not found"}"#).unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\",\"tool_calls\":[{\"function\":{\"name\":\"s1__search\",\"arguments\":{}}}]},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server.uri());
        let stream = provider
            .stream(GenerateRequest {
                input: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let fragments: Vec<Fragment> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].text, "Hel");
        assert_eq!(fragments[1].text, "lo");
        assert_eq!(fragments[2].function_calls[0].name, "s1__search");
    }

    #[tokio::test]
    async fn test_stream_http_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let provider = provider_for(&server.uri());
        let err = match provider.stream(GenerateRequest::default()).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Provider(_))
        ));
    }
}
