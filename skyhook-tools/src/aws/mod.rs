//! AWS service module.
//!
//! Exposes any JSON-protocol AWS API through three tools:
//!
//! - `<prefix>_aws_query`: read-only operations, cached by tier
//! - `<prefix>_aws_execute`: state-changing operations, mutation gated
//! - `<prefix>_aws_list_services`: services with a known target prefix
//!
//! Clients are pooled per (service, region, profile) and released with the
//! rest of the server state on reset or shutdown.
//!
//! # Example
//!
//! ```no_run
//! use skyhook_core::{ServerConfig, SharedState, ToolRegistry};
//! use skyhook_tools::aws;
//!
//! let state = SharedState::new(ServerConfig::default().with_default_region("us-east-1"));
//! let mut registry = ToolRegistry::new();
//! registry.register_tools(aws::register_tools(&state)).unwrap();
//! assert!(registry.contains("skyhook_aws_query"));
//! ```

mod client;
mod tools;

pub use client::{
    default_service_targets, endpoint_for, parse_aws_error, AwsClient, AwsClientFactory,
    AwsClientFactoryBuilder,
};
pub use tools::{
    is_mutative_operation, tier_for, AwsCallInput, AwsExecuteTool, AwsListServicesTool,
    AwsQueryTool, ListServicesInput,
};

use skyhook_core::{box_tools, ClientManager, DynTool, SharedState};
use std::sync::Arc;

use tools::AwsContext;

/// Name of the AWS client pool
pub const POOL_NAME: &str = "aws";

/// Registration entry point using the default AWS credential chain.
pub fn register_tools(state: &SharedState) -> Vec<Box<dyn DynTool>> {
    register_tools_with(state, AwsClientFactory::default())
}

/// Registration entry point with a custom client factory.
pub fn register_tools_with(state: &SharedState, factory: AwsClientFactory) -> Vec<Box<dyn DynTool>> {
    let clients = Arc::new(ClientManager::new(POOL_NAME, factory));
    state.register_pool(clients.clone());

    let ctx = AwsContext {
        state: state.clone(),
        clients,
    };
    let prefix = state.config.tool_prefix.as_str();

    box_tools![
        AwsQueryTool::new(prefix, ctx.clone()),
        AwsExecuteTool::new(prefix, ctx.clone()),
        AwsListServicesTool::new(prefix, ctx),
    ]
}
