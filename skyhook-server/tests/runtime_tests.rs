//! End-to-end tests driving the runtime over in-memory transports.

mod common;

use common::*;
use serde_json::{json, Value};
use skyhook_core::{box_tool, ClientFactory, ClientInitError, ClientKey, ClientManager, SharedState, Tier};
use skyhook_server::{RuntimeError, ServerBuilder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::test]
async fn test_handshake_then_list_and_ping() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (result, responses) = run_session(
        runtime,
        &[
            initialize(1),
            notification("notifications/initialized"),
            request(2, "tools/list", json!({})),
            call(3, "sky:server:ping", json!({})),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(responses.len(), 3, "notification must not be answered");

    let init = &responses[0]["result"];
    assert_eq!(init["serverInfo"]["name"], "skyhook-test");
    assert_eq!(init["protocolVersion"], "2024-11-05");
    assert!(init["capabilities"]["tools"].is_object());

    let names: Vec<&str> = responses[1]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"sky:server:info"));
    assert!(names.contains(&"sky:server:ping"));

    assert_eq!(responses[2]["id"], 3);
    assert_eq!(responses[2]["result"]["structuredContent"], json!({"ok": true}));
    assert_eq!(responses[2]["result"]["isError"], false);
}

#[tokio::test]
async fn test_list_before_initialize_compat_mode() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (result, responses) = run_session(
        runtime,
        &[
            request(1, "tools/list", json!({})),
            call(2, "sky:server:ping", json!({})),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert!(responses[0]["result"]["tools"].is_array());
    assert_eq!(responses[1]["result"]["structuredContent"]["ok"], true);
}

#[tokio::test]
async fn test_list_before_initialize_strict_mode() {
    let runtime = ServerBuilder::new(test_config().with_strict_handshake(true))
        .build()
        .unwrap();
    let (result, responses) = run_session(
        runtime,
        &[
            request(1, "tools/list", json!({})),
            initialize(2),
            request(3, "tools/list", json!({})),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(responses[0]["error"]["code"], -32002);
    assert_eq!(responses[0]["error"]["data"]["kind"], "protocol_sequence");
    assert!(responses[1]["result"].is_object());
    assert!(responses[2]["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_malformed_line_does_not_disturb_session() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (result, responses) = run_session(
        runtime,
        &[
            initialize(1),
            Value::String("{\"jsonrpc\": \"2.0\", \"id\": ".to_string()),
            Value::String(String::new()),
            call(2, "sky:server:ping", json!({})),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(responses.len(), 3, "blank lines are skipped");
    assert_eq!(responses[1]["error"]["code"], -32700);
    assert_eq!(responses[1]["id"], Value::Null);
    assert_eq!(responses[2]["result"]["structuredContent"]["ok"], true);
}

#[tokio::test]
async fn test_request_ids_echoed_unchanged() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (_, responses) = run_session(
        runtime,
        &[
            json!({"jsonrpc": "2.0", "id": "req-α", "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 9007199254740991i64, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": {"nested": [1]}, "method": "nope"}),
            json!({"jsonrpc": "2.0", "id": null, "method": "ping"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["id"], "req-α");
    assert_eq!(responses[0]["result"], json!({}));
    assert_eq!(responses[1]["id"], 9007199254740991i64);
    assert_eq!(responses[2]["id"], json!({"nested": [1]}));
    assert_eq!(responses[2]["error"]["code"], -32601);
    assert_eq!(responses[3]["id"], Value::Null);
    assert_eq!(responses[3]["result"], json!({}));
}

#[tokio::test]
async fn test_unknown_tool() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (result, responses) =
        run_session(runtime, &[initialize(1), call(2, "sky:nothing:here", json!({}))]).await;

    assert!(result.is_ok());
    let error = &responses[1]["error"];
    assert_eq!(error["code"], -32602);
    assert_eq!(error["data"]["kind"], "unknown_tool");
    assert_eq!(error["data"]["retryable"], false);
}

#[tokio::test]
async fn test_confirmation_required_never_invokes_handler() {
    let (tool, calls) = CountingTool::mutating("sky_db_drop_table");
    let runtime = ServerBuilder::new(test_config().with_allow_mutations(true))
        .add_tools(vec![box_tool(tool)])
        .build()
        .unwrap();

    let (_, responses) = run_session(
        runtime,
        &[
            initialize(1),
            call(2, "sky_db_drop_table", json!({"target": "users"})),
            call(3, "sky:db:drop-table", json!({"target": "users", "confirm": false})),
        ],
    )
    .await;

    for response in &responses[1..] {
        assert_eq!(response["error"]["code"], -32011);
        assert_eq!(response["error"]["data"]["category"], "configuration");
        assert!(response["error"]["data"]["hint"]
            .as_str()
            .unwrap()
            .contains("confirm"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_confirmed_mutation_runs_once() {
    let (tool, calls) = CountingTool::mutating("sky_db_drop_table");
    let runtime = ServerBuilder::new(test_config().with_allow_mutations(true))
        .add_tools(vec![box_tool(tool)])
        .build()
        .unwrap();

    let (_, responses) = run_session(
        runtime,
        &[call(1, "sky:db:drop-table", json!({"target": "users", "confirm": true}))],
    )
    .await;

    assert_eq!(responses[0]["result"]["structuredContent"]["call"], 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_read_only_tool_keeps_its_confirm_argument() {
    let runtime = ServerBuilder::new(test_config())
        .add_tools(vec![box_tool(EchoTool)])
        .build()
        .unwrap();

    let (_, responses) = run_session(
        runtime,
        &[call(1, "sky_test_echo", json!({"confirm": "yes", "target": "users"}))],
    )
    .await;

    assert_eq!(
        responses[0]["result"]["structuredContent"],
        json!({"confirm": "yes", "target": "users"})
    );
}

#[tokio::test]
async fn test_mutations_disabled_even_with_confirm() {
    let (tool, calls) = CountingTool::mutating("sky_db_drop_table");
    let runtime = ServerBuilder::new(test_config())
        .add_tools(vec![box_tool(tool)])
        .build()
        .unwrap();

    let (_, responses) = run_session(
        runtime,
        &[call(1, "sky_db_drop_table", json!({"confirm": true}))],
    )
    .await;

    assert_eq!(responses[0]["error"]["code"], -32010);
    assert!(responses[0]["error"]["data"]["hint"]
        .as_str()
        .unwrap()
        .contains("SKYHOOK_ALLOW_MUTATIONS"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_defaults_injected_without_overwriting() {
    let (tool, _) = CountingTool::read_only("sky_compute_list_instances");
    let config = test_config()
        .with_default_region("us-1")
        .with_default_profile("DEFAULT");
    let runtime = ServerBuilder::new(config)
        .add_tools(vec![box_tool(tool)])
        .build()
        .unwrap();

    let (_, responses) = run_session(
        runtime,
        &[
            call(1, "sky:compute:list-instances", json!({})),
            call(2, "sky_compute_list_instances", json!({"region": "eu-2"})),
        ],
    )
    .await;

    let first = &responses[0]["result"]["structuredContent"];
    assert_eq!(first["region"], "us-1");
    assert_eq!(first["profile"], "DEFAULT");
    let second = &responses[1]["result"]["structuredContent"];
    assert_eq!(second["region"], "eu-2");
}

#[tokio::test]
async fn test_list_marks_mutating_tools() {
    let (reader, _) = CountingTool::read_only("sky_db_list_tables");
    let (writer, _) = CountingTool::mutating("sky_db_drop_table");
    let runtime = ServerBuilder::new(test_config())
        .add_tools(vec![box_tool(reader), box_tool(writer)])
        .build()
        .unwrap();

    let (_, responses) = run_session(runtime, &[request(1, "tools/list", json!({}))]).await;
    let tools = responses[0]["result"]["tools"].as_array().unwrap();
    let find = |name: &str| tools.iter().find(|t| t["name"] == name).unwrap().clone();

    let drop = find("sky_db_drop_table");
    assert_eq!(drop["annotations"]["destructiveHint"], true);
    assert_eq!(drop["inputSchema"]["properties"]["confirm"]["type"], "boolean");

    let list = find("sky:db:list-tables");
    assert_eq!(list["annotations"]["readOnlyHint"], true);
    assert!(list["inputSchema"]["properties"].get("confirm").is_none());
}

#[tokio::test]
async fn test_handler_error_is_structured_and_session_continues() {
    let runtime = ServerBuilder::new(test_config())
        .add_tools(vec![box_tool(FailingTool { fatal: false })])
        .build()
        .unwrap();

    let (result, responses) = run_session(
        runtime,
        &[
            call(1, "sky_test_fail", json!({})),
            call(2, "sky:server:ping", json!({})),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(responses[0]["error"]["code"], -32000);
    assert_eq!(responses[0]["error"]["message"], "bucket 'logs' not found");
    assert_eq!(responses[0]["error"]["data"]["retryable"], true);
    assert_eq!(responses[1]["result"]["structuredContent"]["ok"], true);
}

#[tokio::test]
async fn test_fatal_handler_error_stops_serving() {
    let runtime = ServerBuilder::new(test_config())
        .add_tools(vec![box_tool(FailingTool { fatal: true })])
        .build()
        .unwrap();

    let (result, responses) = run_session(
        runtime,
        &[
            call(1, "sky_test_explode", json!({})),
            call(2, "sky:server:ping", json!({})),
        ],
    )
    .await;

    assert!(matches!(result, Err(RuntimeError::Fatal(msg)) if msg.contains("credentials revoked")));
    assert_eq!(responses.len(), 1, "the fatal response is flushed, nothing after it");
    assert_eq!(responses[0]["error"]["code"], -32000);
}

#[tokio::test]
async fn test_invalid_tool_arguments() {
    let runtime = ServerBuilder::new(test_config()).build().unwrap();
    let (_, responses) = run_session(
        runtime,
        &[request(1, "tools/call", json!({"name": "sky:server:ping", "arguments": "x"}))],
    )
    .await;
    assert_eq!(responses[0]["error"]["code"], -32602);
}

struct UnitFactory;

impl ClientFactory for UnitFactory {
    type Client = ();

    async fn create(&self, _key: &ClientKey) -> Result<(), ClientInitError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_clears_cache_and_pools() {
    let state = SharedState::new(test_config());
    let pool = Arc::new(ClientManager::new("unit", UnitFactory));
    state.register_pool(pool.clone());
    pool.get(&ClientKey::new("compute", "us-1", "DEFAULT")).await.unwrap();
    state.cache.set(Tier::Config, "shapes", json!(["small"]));

    let runtime = builder_with(&state).build().unwrap();
    let (result, _) = run_session(runtime, &[initialize(1)]).await;

    let summary = result.unwrap();
    assert_eq!(summary.cache_entries, 1);
    assert_eq!(summary.clients, 1);
    assert!(pool.is_empty());
    assert_eq!(state.cache.get(Tier::Config, "shapes"), None);
}

#[tokio::test]
async fn test_clear_cache_tool() {
    let state = SharedState::new(test_config());
    state.cache.set(Tier::Operational, "k", json!(1));

    let runtime = builder_with(&state).build().unwrap();
    let (_, responses) =
        run_session(runtime, &[call(1, "sky:server:clear-cache", json!({}))]).await;

    assert_eq!(responses[0]["result"]["structuredContent"]["cacheEntries"], 1);
}

#[tokio::test]
async fn test_terminate_signal_over_duplex() {
    let state = SharedState::new(test_config());
    state.cache.set(Tier::Metrics, "cpu", json!(0.5));
    let runtime = builder_with(&state).build().unwrap();

    let (host, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let (host_read, mut host_write) = tokio::io::split(host);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let serving = tokio::spawn(runtime.serve(BufReader::new(server_read), server_write, async {
        let _ = stop_rx.await;
    }));

    host_write
        .write_all(format!("{}\n", call(1, "sky:server:ping", json!({}))).as_bytes())
        .await
        .unwrap();
    let mut lines = BufReader::new(host_read).lines();
    let reply: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["result"]["structuredContent"]["ok"], true);

    stop_tx.send(()).unwrap();
    let summary = serving.await.unwrap().unwrap();
    assert_eq!(summary.cache_entries, 1);
    assert_eq!(state.cache.stats().total_entries(), 0);
}
