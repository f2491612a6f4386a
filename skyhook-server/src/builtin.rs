//! Runtime-owned `server` tools.
//!
//! `<prefix>:server:info` and `<prefix>:server:ping` are synthesized after the
//! alias pass so hosts can probe any skyhook process without domain knowledge.
//! `<prefix>_server_clear_cache` is registered like a module tool and so gains
//! the `<prefix>:server:clear-cache` alias.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use skyhook_core::{SharedState, Tool, ToolError, ToolResult};

use crate::protocol::PROTOCOL_VERSION;

/// Transport kind reported by `server:info`
pub const TRANSPORT_KIND: &str = "stdio";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoInput {}

pub struct ServerInfoTool {
    name: String,
    state: SharedState,
    tool_count: usize,
    started_at: DateTime<Utc>,
}

impl ServerInfoTool {
    pub fn new(prefix: &str, state: SharedState, tool_count: usize) -> Self {
        Self {
            name: format!("{prefix}:server:info"),
            state,
            tool_count,
            started_at: Utc::now(),
        }
    }
}

impl Tool for ServerInfoTool {
    type Input = NoInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Report server identity, active defaults, transport and mutation settings"
    }

    async fn execute(&self, _input: NoInput) -> Result<ToolResult, ToolError> {
        let config = &self.state.config;
        Ok(ToolResult::Json(json!({
            "service": config.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "protocolVersion": PROTOCOL_VERSION,
            "transport": TRANSPORT_KIND,
            "toolPrefix": config.tool_prefix,
            "defaults": {
                "profile": config.default_profile,
                "region": config.default_region,
            },
            "mutations": {
                "allowed": config.allow_mutations,
                "requireConfirmation": config.require_confirmation,
            },
            "tools": self.tool_count,
            "clientPools": self.state.pool_count(),
            "activeClients": self.state.active_clients(),
            "cache": self.state.cache.stats(),
            "startedAt": self.started_at.to_rfc3339(),
        })))
    }
}

pub struct PingTool {
    name: String,
}

impl PingTool {
    pub fn new(prefix: &str) -> Self {
        Self {
            name: format!("{prefix}:server:ping"),
        }
    }
}

impl Tool for PingTool {
    type Input = NoInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Liveness probe; always returns {\"ok\": true}"
    }

    async fn execute(&self, _input: NoInput) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::Json(json!({"ok": true})))
    }
}

/// Clears every cache tier and releases every pooled client.
pub struct ClearCacheTool {
    name: String,
    state: SharedState,
}

impl ClearCacheTool {
    pub fn new(prefix: &str, state: SharedState) -> Self {
        Self {
            name: format!("{prefix}_server_clear_cache"),
            state,
        }
    }
}

impl Tool for ClearCacheTool {
    type Input = NoInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Drop all cached responses and pooled API clients"
    }

    async fn execute(&self, _input: NoInput) -> Result<ToolResult, ToolError> {
        let summary = self.state.reset();
        tracing::info!(
            cache_entries = summary.cache_entries,
            clients = summary.clients,
            "cleared caches on request"
        );
        Ok(ToolResult::json(json!({
            "cleared": true,
            "cacheEntries": summary.cache_entries,
            "clients": summary.clients,
        }))?)
    }
}
