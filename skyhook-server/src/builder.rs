//! Builder assembling a [`Runtime`] from service modules.

use std::sync::Arc;

use skyhook_core::{
    box_tool, DynTool, ServerConfig, SharedState, ToolDescriptor, ToolRegistry,
};

use crate::builtin::{ClearCacheTool, PingTool, ServerInfoTool};
use crate::error::BuildError;
use crate::runtime::Runtime;

/// Builder for a skyhook runtime.
///
/// # Example
///
/// ```rust
/// use skyhook_server::ServerBuilder;
/// use skyhook_core::ServerConfig;
///
/// let runtime = ServerBuilder::new(ServerConfig::default())
///     .build()
///     .unwrap();
/// assert!(runtime.registry().contains("skyhook:server:ping"));
/// ```
pub struct ServerBuilder {
    state: SharedState,
    registry: ToolRegistry,
    batches: Vec<Vec<Box<dyn DynTool>>>,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self::from_state(SharedState::new(config))
    }

    /// Build on an existing shared state (tests use this to inspect caches
    /// and pools after the runtime has been consumed).
    pub fn from_state(state: SharedState) -> Self {
        let clear_cache = ClearCacheTool::new(&state.config.tool_prefix, state.clone());
        Self {
            state,
            registry: ToolRegistry::new(),
            batches: vec![vec![box_tool(clear_cache)]],
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Add one registration batch.
    pub fn add_tools(mut self, tools: Vec<Box<dyn DynTool>>) -> Self {
        self.batches.push(tools);
        self
    }

    /// Add the batch a service module's `register_tools` entry point returns.
    pub fn with_module<F>(self, register: F) -> Self
    where
        F: FnOnce(&SharedState) -> Vec<Box<dyn DynTool>>,
    {
        let tools = register(&self.state);
        self.add_tools(tools)
    }

    /// Register every batch, run the alias pass and add the synthetic
    /// `server:info` and `server:ping` tools.
    pub fn build(mut self) -> Result<Runtime, BuildError> {
        self.state.config.validate()?;
        let prefix = self.state.config.tool_prefix.clone();

        for batch in std::mem::take(&mut self.batches) {
            self.registry.register_tools(batch)?;
        }

        let aliases = self.registry.synthesize_aliases(&prefix);
        tracing::debug!(aliases, "synthesized tool aliases");

        let tool_count = self.registry.len() + 2;
        let info = ServerInfoTool::new(&prefix, self.state.clone(), tool_count);
        self.registry
            .add_synthetic(ToolDescriptor::from_tool(box_tool(info)));
        self.registry
            .add_synthetic(ToolDescriptor::from_tool(box_tool(PingTool::new(&prefix))));

        tracing::info!(tools = self.registry.len(), "tool registry ready");
        Ok(Runtime::new(Arc::new(self.registry), self.state))
    }
}
