//! # skyhook-core
//!
//! Building blocks of the skyhook tool-call runtime.
//!
//! A service module implements [`Tool`] for each operation it exposes and hands
//! the boxed tools to a [`ToolRegistry`]. The runtime (in `skyhook-server`)
//! resolves calls through the registry, merges process defaults with a
//! [`DefaultInjector`], checks the [`MutationGate`] and invokes the handler.
//! Handlers reach external APIs through a [`ClientManager`] and keep hot data
//! in a [`TieredCache`], both shared through [`SharedState`].
//!
//! ## Defining a tool
//!
//! ```rust
//! use skyhook_core::{box_tools, Tool, ToolError, ToolResult, ToolRegistry};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct ListInput {
//!     region: Option<String>,
//! }
//!
//! struct ListInstances;
//!
//! impl Tool for ListInstances {
//!     type Input = ListInput;
//!
//!     fn name(&self) -> &str { "skyhook_compute_list_instances" }
//!     fn description(&self) -> &str { "List compute instances" }
//!
//!     async fn execute(&self, input: Self::Input) -> Result<ToolResult, ToolError> {
//!         Ok(ToolResult::json(serde_json::json!({ "region": input.region, "items": [] }))?)
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register_tools(box_tools![ListInstances]).unwrap();
//! registry.synthesize_aliases("skyhook");
//! assert!(registry.contains("skyhook:compute:list-instances"));
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod gate;
pub mod registry;
pub mod state;
pub mod tool;

pub use cache::{hash_key, CacheConfig, CacheStats, Tier, TierStats, TieredCache};
pub use client::{
    ClientFactory, ClientInitError, ClientKey, ClientManager, ClientPool, DEFAULT_PROFILE,
};
pub use config::{ConfigError, ServerConfig};
pub use defaults::{DefaultInjector, PROFILE_KEY, REGION_KEY};
pub use error::{DispatchError, ErrorCategory};
pub use gate::{take_confirm, GateError, MutationGate, CONFIRM_KEY};
pub use registry::{derive_alias, RegistryError, ToolDescriptor, ToolRegistry};
pub use state::{ResetSummary, SharedState};
pub use tool::{box_tool, DynTool, Tool, ToolError, ToolResult};
