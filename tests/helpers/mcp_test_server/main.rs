//! MCP test server binary for integration tests
//!
//! This binary implements a minimal MCP server that communicates over
//! stdin/stdout using newline-delimited JSON (the stdio transport protocol).
//! It is used exclusively by integration tests to exercise the stdio
//! transport and the connection registry without a real external server.
//!
//! # Handled Methods
//!
//! - `initialize` -- responds with protocol version `2025-06-18` and
//!   capabilities for tools, prompts and resources. When the environment
//!   variable `MCP_TEST_FAIL_INIT` is set, responds with an error instead.
//! - `notifications/initialized` -- acknowledged silently (no response).
//! - `tools/list` -- `echo`, `fail` and `env`.
//! - `tools/call` -- `echo` returns its `message` argument, `fail` returns
//!   an `isError` result, `env` returns the value of `MCP_TEST_GREETING`.
//! - `prompts/list`, `prompts/get` -- one prompt, `greet`.
//! - `resources/list`, `resources/read` -- one resource, `mem://readme`.
//! - `ping` -- empty result.
//! - All other methods -- JSON-RPC `-32601 Method not found`.

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let response = make_error(&Value::Null, -32700, "Parse error");
                if !write_line(&mut out, &response) {
                    break;
                }
                continue;
            }
        };

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");

        // Notifications carry no id and get no response.
        let Some(id) = request.get("id").cloned() else {
            eprintln!("mcp_test_server: notification {}", method);
            continue;
        };

        let params = request.get("params").cloned().unwrap_or(Value::Null);
        let response = match method {
            "initialize" => handle_initialize(&id),
            "tools/list" => handle_tools_list(&id),
            "tools/call" => handle_tools_call(&id, &params),
            "prompts/list" => handle_prompts_list(&id),
            "prompts/get" => handle_prompts_get(&id, &params),
            "resources/list" => handle_resources_list(&id),
            "resources/read" => handle_resources_read(&id, &params),
            "ping" => make_result(&id, json!({})),
            _ => make_error(&id, -32601, &format!("Method not found: {}", method)),
        };

        if !write_line(&mut out, &response) {
            break;
        }
    }
}

fn write_line(out: &mut impl Write, response: &Value) -> bool {
    writeln!(out, "{}", response).is_ok() && out.flush().is_ok()
}

fn handle_initialize(id: &Value) -> Value {
    if std::env::var_os("MCP_TEST_FAIL_INIT").is_some() {
        return make_error(id, -32603, "initialization refused");
    }
    make_result(
        id,
        json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {
                "tools": {},
                "prompts": {},
                "resources": {}
            },
            "serverInfo": {
                "name": "mcp-test-server",
                "version": "0.1.0"
            }
        }),
    )
}

fn handle_tools_list(id: &Value) -> Value {
    make_result(
        id,
        json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echoes input",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "message": { "type": "string" } }
                    }
                },
                {
                    "name": "fail",
                    "description": "Always reports an error",
                    "inputSchema": { "type": "object" }
                },
                {
                    "name": "env",
                    "description": "Returns MCP_TEST_GREETING",
                    "inputSchema": { "type": "object" }
                }
            ]
        }),
    )
}

fn handle_tools_call(id: &Value, params: &Value) -> Value {
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    match tool_name {
        "echo" => {
            let message = params
                .get("arguments")
                .and_then(|a| a.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("");
            make_result(
                id,
                json!({ "content": [{ "type": "text", "text": message }], "isError": false }),
            )
        }
        "fail" => make_result(
            id,
            json!({ "content": [{ "type": "text", "text": "tool exploded" }], "isError": true }),
        ),
        "env" => {
            let greeting = std::env::var("MCP_TEST_GREETING").unwrap_or_default();
            make_result(
                id,
                json!({
                    "content": [{ "type": "text", "text": greeting }],
                    "structuredContent": { "greeting": greeting }
                }),
            )
        }
        other => make_error(id, -32602, &format!("Unknown tool: {}", other)),
    }
}

fn handle_prompts_list(id: &Value) -> Value {
    make_result(
        id,
        json!({
            "prompts": [{
                "name": "greet",
                "description": "Greets someone",
                "arguments": [{ "name": "who", "required": true }]
            }]
        }),
    )
}

fn handle_prompts_get(id: &Value, params: &Value) -> Value {
    let who = params
        .get("arguments")
        .and_then(|a| a.get("who"))
        .and_then(|w| w.as_str())
        .unwrap_or("world");
    make_result(
        id,
        json!({
            "description": "Greets someone",
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": format!("Say hello to {}", who) }
            }]
        }),
    )
}

fn handle_resources_list(id: &Value) -> Value {
    make_result(
        id,
        json!({
            "resources": [{
                "uri": "mem://readme",
                "name": "readme",
                "mimeType": "text/plain"
            }]
        }),
    )
}

fn handle_resources_read(id: &Value, params: &Value) -> Value {
    let uri = params.get("uri").and_then(|u| u.as_str()).unwrap_or("");
    if uri != "mem://readme" {
        return make_error(id, -32002, &format!("Resource not found: {}", uri));
    }
    make_result(
        id,
        json!({
            "contents": [{ "uri": uri, "mimeType": "text/plain", "text": "hello from the test server" }]
        }),
    )
}

fn make_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Build a JSON-RPC error response.
fn make_error(id: &Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}
