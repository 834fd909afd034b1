//! Connection registry integration tests over the stdio transport
//!
//! Each test spawns the `mcp_test_server` helper binary through the real
//! `McpConnector`, so the full pipeline is exercised: process spawn,
//! `initialize` handshake, request/response correlation and shutdown.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use toolrelay::error::RelayError;
use toolrelay::mcp::types::ResourceContents;
use toolrelay::mcp::{ConnectionRegistry, QualifiedToolName, TransportKind};

use common::test_server_config;

fn relay(err: &anyhow::Error) -> &RelayError {
    err.downcast_ref::<RelayError>()
        .expect("error should carry a RelayError")
}

#[tokio::test]
async fn test_connect_list_and_call_tools() {
    let registry = ConnectionRegistry::default();
    registry
        .connect("s1", test_server_config(&[]))
        .await
        .expect("connect to mcp_test_server");

    assert!(registry.is_connected("s1").await);
    let connections = registry.list_connections().await;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].transport, TransportKind::Stdio);

    let tools = registry.list_tools("s1").await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "fail", "env"]);
    assert_eq!(tools[0].qualified_name(), "s1__echo");

    let result = registry
        .call_tool("s1", "echo", serde_json::json!({ "message": "hi there" }))
        .await
        .unwrap();
    assert_eq!(result[0]["type"], "text");
    assert_eq!(result[0]["text"], "hi there");

    registry.disconnect("s1").await;
    assert!(!registry.is_connected("s1").await);
}

#[tokio::test]
async fn test_tool_reporting_error_is_tool_invocation_error() {
    let registry = ConnectionRegistry::default();
    registry.connect("s1", test_server_config(&[])).await.unwrap();

    let err = registry
        .call_tool("s1", "fail", serde_json::json!({}))
        .await
        .unwrap_err();
    match relay(&err) {
        RelayError::ToolInvocation(message) => assert!(message.contains("tool exploded")),
        other => panic!("expected ToolInvocation, got {other:?}"),
    }

    // An unknown tool is a JSON-RPC error, surfaced the same way.
    let err = registry
        .call_tool("s1", "missing", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(relay(&err), RelayError::ToolInvocation(_)));

    registry.disconnect_all().await;
}

#[tokio::test]
async fn test_environment_reaches_server_and_structured_content_wins() {
    let registry = ConnectionRegistry::default();
    registry
        .connect("s1", test_server_config(&[("MCP_TEST_GREETING", "bonjour")]))
        .await
        .unwrap();

    let name: QualifiedToolName = "s1__env".parse().unwrap();
    let result = registry
        .call_qualified(&name, serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!({ "greeting": "bonjour" }));

    registry.disconnect_all().await;
}

#[tokio::test]
async fn test_prompts_and_resources() {
    let registry = ConnectionRegistry::default();
    registry.connect("s1", test_server_config(&[])).await.unwrap();

    let prompts = registry.list_prompts("s1").await.unwrap();
    assert_eq!(prompts[0].name, "greet");

    let mut args = HashMap::new();
    args.insert("who".to_string(), "Ada".to_string());
    let prompt = registry.get_prompt("s1", "greet", Some(args)).await.unwrap();
    assert_eq!(prompt.messages[0]["content"]["text"], "Say hello to Ada");

    let resources = registry.list_resources("s1").await.unwrap();
    assert_eq!(resources[0].uri, "mem://readme");

    let contents = registry.read_resource("s1", "mem://readme").await.unwrap();
    match &contents[0] {
        ResourceContents::Text(text) => assert_eq!(text.text, "hello from the test server"),
        other => panic!("expected text contents, got {other:?}"),
    }

    registry.disconnect_all().await;
}

#[tokio::test]
async fn test_failed_handshake_leaves_registry_unchanged() {
    let registry = ConnectionRegistry::default();
    let err = registry
        .connect("s1", test_server_config(&[("MCP_TEST_FAIL_INIT", "1")]))
        .await
        .unwrap_err();

    match relay(&err) {
        RelayError::Connection { server, message } => {
            assert_eq!(server, "s1");
            assert!(message.contains("initialization refused"), "{message}");
        }
        other => panic!("expected Connection error, got {other:?}"),
    }
    assert!(!registry.is_connected("s1").await);
    assert!(registry.list_connections().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_connects_share_one_entry() {
    let registry = Arc::new(ConnectionRegistry::default());
    let attempts = (0..4).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.connect("s1", test_server_config(&[])).await })
    });
    for result in futures::future::join_all(attempts).await {
        result.unwrap().unwrap();
    }

    assert_eq!(registry.list_connections().await.len(), 1);
    registry.disconnect_all().await;
    assert!(registry.list_connections().await.is_empty());
}

#[tokio::test]
async fn test_get_all_tools_across_servers() {
    let registry = ConnectionRegistry::default();
    registry.connect("b", test_server_config(&[])).await.unwrap();
    registry.connect("a", test_server_config(&[])).await.unwrap();

    let qualified: Vec<String> = registry
        .get_all_tools()
        .await
        .iter()
        .map(|t| t.qualified_name())
        .collect();
    assert_eq!(
        qualified,
        vec!["a__echo", "a__fail", "a__env", "b__echo", "b__fail", "b__env"]
    );

    registry.disconnect_all().await;
}

#[tokio::test]
async fn test_calls_after_disconnect_are_not_connected() {
    let registry = ConnectionRegistry::default();
    registry.connect("s1", test_server_config(&[])).await.unwrap();
    registry.disconnect("s1").await;
    registry.disconnect("s1").await;

    let err = registry.list_tools("s1").await.unwrap_err();
    assert!(matches!(relay(&err), RelayError::NotConnected(id) if id == "s1"));
}
