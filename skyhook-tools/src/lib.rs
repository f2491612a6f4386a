//! Service modules for skyhook.
//!
//! Each module exposes a `register_tools(&SharedState) -> Vec<Box<dyn DynTool>>`
//! entry point whose batch the server registers at startup.

#[cfg(feature = "aws")]
pub mod aws;
