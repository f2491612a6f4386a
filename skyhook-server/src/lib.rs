//! # skyhook-server
//!
//! Serves a [`skyhook_core::ToolRegistry`] to a host over newline-delimited
//! JSON-RPC 2.0.
//!
//! ```rust,no_run
//! use skyhook_core::ServerConfig;
//! use skyhook_server::ServerBuilder;
//! use tokio::io::BufReader;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = ServerBuilder::new(ServerConfig::from_env()?)
//!     .with_module(skyhook_tools::aws::register_tools)
//!     .build()?;
//!
//! runtime
//!     .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), std::future::pending())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod builtin;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod runtime;

pub use builder::ServerBuilder;
pub use error::{BuildError, RuntimeError};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
pub use runtime::{Phase, Runtime};
