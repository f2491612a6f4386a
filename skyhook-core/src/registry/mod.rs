//! Tool registry.
//!
//! The registry holds the ordered list of invocable tools for one server
//! process. It is populated once at startup from one or more registration
//! batches (one per service module), extended with colon-form aliases and
//! runtime-owned synthetic tools, and then frozen behind an `Arc`.
//!
//! ```
//! use skyhook_core::registry::ToolRegistry;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Vec::new()).unwrap();
//! assert!(registry.is_empty());
//! ```

mod alias;

pub use alias::derive_alias;

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::tool::{DynTool, ToolError, ToolResult};

/// Errors raised while building or querying a registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two descriptors in one registration batch share a name
    #[error("duplicate tool name '{0}' in registration batch")]
    DuplicateName(String),

    /// No descriptor (or alias) with this name exists
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Immutable record describing one invocable tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: Value,
    handler: Arc<dyn DynTool>,
    mutating: bool,
    alias_of: Option<String>,
}

impl ToolDescriptor {
    /// Build a descriptor from a boxed tool, taking name, schema and flags from it.
    pub fn from_tool(tool: Box<dyn DynTool>) -> Self {
        Self::from_handler(Arc::from(tool))
    }

    /// Build a descriptor from a shared handler.
    pub fn from_handler(handler: Arc<dyn DynTool>) -> Self {
        Self {
            name: handler.name().to_string(),
            description: handler.description().to_string(),
            parameters: handler.input_schema(),
            mutating: handler.mutating(),
            handler,
            alias_of: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Description used for discovery; never empty.
    pub fn listing_description(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.name
        } else {
            &self.description
        }
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    /// Canonical name this descriptor aliases, if it is an alias
    pub fn alias_of(&self) -> Option<&str> {
        self.alias_of.as_deref()
    }

    pub fn handler(&self) -> &Arc<dyn DynTool> {
        &self.handler
    }

    /// Invoke the handler with a JSON argument map.
    pub async fn invoke(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        self.handler.execute_raw(arguments).await
    }

    fn aliased(&self, alias: String) -> Self {
        Self {
            name: alias,
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            handler: Arc::clone(&self.handler),
            mutating: self.mutating,
            alias_of: Some(self.name.clone()),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("mutating", &self.mutating)
            .field("alias_of", &self.alias_of)
            .finish_non_exhaustive()
    }
}

/// Ordered name → descriptor mapping.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one batch of descriptors.
    ///
    /// A name repeated inside the batch fails the whole batch and leaves the
    /// registry untouched. A name already registered by an earlier batch is
    /// shadowed: the new descriptor replaces the old one at its original
    /// listing position.
    pub fn register<I>(&mut self, batch: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = ToolDescriptor>,
    {
        let batch: Vec<ToolDescriptor> = batch.into_iter().collect();

        let mut seen = HashSet::with_capacity(batch.len());
        for descriptor in &batch {
            if !seen.insert(descriptor.name()) {
                return Err(RegistryError::DuplicateName(descriptor.name.clone()));
            }
        }

        for descriptor in batch {
            match self.index.get(descriptor.name()) {
                Some(&position) => {
                    tracing::debug!(tool = %descriptor.name, "shadowing previously registered tool");
                    self.tools[position] = descriptor;
                }
                None => self.push(descriptor),
            }
        }

        Ok(())
    }

    /// Register a batch of boxed tools (the shape service modules return).
    pub fn register_tools(&mut self, tools: Vec<Box<dyn DynTool>>) -> Result<(), RegistryError> {
        self.register(tools.into_iter().map(ToolDescriptor::from_tool))
    }

    /// Append colon-form aliases for every canonical tool.
    ///
    /// Existing names always win over generated aliases. Returns the number
    /// of aliases added.
    pub fn synthesize_aliases(&mut self, prefix: &str) -> usize {
        let aliases: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .filter(|t| t.alias_of.is_none())
            .filter_map(|t| derive_alias(t.name(), prefix).map(|alias| t.aliased(alias)))
            .collect();

        let mut added = 0;
        for alias in aliases {
            if self.index.contains_key(alias.name()) {
                tracing::debug!(alias = %alias.name, "alias already registered, keeping explicit tool");
                continue;
            }
            tracing::debug!(alias = %alias.name, tool = ?alias.alias_of, "registered alias");
            self.push(alias);
            added += 1;
        }
        added
    }

    /// Append a runtime-owned tool. Returns false if the name is already taken.
    pub fn add_synthetic(&mut self, descriptor: ToolDescriptor) -> bool {
        if self.index.contains_key(descriptor.name()) {
            tracing::warn!(tool = %descriptor.name, "synthetic tool name already registered; skipping");
            return false;
        }
        self.push(descriptor);
        true
    }

    /// Ordered snapshot for tool discovery
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&position| &self.tools[position])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn push(&mut self, descriptor: ToolDescriptor) {
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
    }
}
