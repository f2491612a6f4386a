//! Common test utilities shared across test files.
//!
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use skyhook_core::{ResetSummary, ServerConfig, SharedState, Tool, ToolError, ToolResult};
use skyhook_server::{Runtime, RuntimeError, ServerBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Tools =====

/// Input for the test tools; echoes whatever region/profile the runtime injected
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TargetInput {
    pub target: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// Tool that counts invocations
pub struct CountingTool {
    pub name: &'static str,
    pub mutating: bool,
    pub calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn read_only(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        Self::build(name, false)
    }

    pub fn mutating(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        Self::build(name, true)
    }

    fn build(name: &'static str, mutating: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                mutating,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Tool for CountingTool {
    type Input = TargetInput;

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Counts calls and echoes injected defaults"
    }

    fn mutating(&self) -> bool {
        self.mutating
    }

    async fn execute(&self, input: TargetInput) -> Result<ToolResult, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToolResult::Json(json!({
            "call": call,
            "target": input.target,
            "region": input.region,
            "profile": input.profile,
        })))
    }
}

/// Tool that always fails, optionally fatally
pub struct FailingTool {
    pub fatal: bool,
}

impl Tool for FailingTool {
    type Input = Value;

    fn name(&self) -> &str {
        if self.fatal {
            "sky_test_explode"
        } else {
            "sky_test_fail"
        }
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    async fn execute(&self, _input: Value) -> Result<ToolResult, ToolError> {
        if self.fatal {
            Err(ToolError::Fatal("credentials revoked".to_string()))
        } else {
            Err(ToolError::Custom("bucket 'logs' not found".to_string()))
        }
    }
}

/// Read-only tool that returns the arguments it received
pub struct EchoTool;

impl Tool for EchoTool {
    type Input = Value;

    fn name(&self) -> &str {
        "sky_test_echo"
    }

    fn description(&self) -> &str {
        "Echoes its arguments"
    }

    async fn execute(&self, input: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::Json(input))
    }
}

// ===== Session helpers =====

pub fn test_config() -> ServerConfig {
    ServerConfig::default()
        .with_tool_prefix("sky")
        .with_service_name("skyhook-test")
}

pub fn request(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

pub fn notification(method: &str) -> Value {
    json!({"jsonrpc": "2.0", "method": method})
}

pub fn call(id: i64, name: &str, arguments: Value) -> Value {
    request(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

pub fn initialize(id: i64) -> Value {
    request(
        id,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-host", "version": "0.0.1"}
        }),
    )
}

/// Run a session over an in-memory transport until end of input.
///
/// Each item is written as one line; strings are sent raw so tests can
/// inject malformed input.
pub async fn run_session(runtime: Runtime, lines: &[Value]) -> (Result<ResetSummary, RuntimeError>, Vec<Value>) {
    let mut input = String::new();
    for line in lines {
        match line {
            Value::String(raw) => input.push_str(raw),
            other => input.push_str(&other.to_string()),
        }
        input.push('\n');
    }

    let mut output = Vec::new();
    let result = runtime
        .serve(input.as_bytes(), &mut output, std::future::pending())
        .await;

    let responses = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (result, responses)
}

pub fn builder_with(state: &SharedState) -> ServerBuilder {
    ServerBuilder::from_state(state.clone())
}
