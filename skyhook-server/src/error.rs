//! Error types for the skyhook server.

use skyhook_core::{ConfigError, RegistryError};

/// Errors that can occur when building a runtime.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A service module contributed conflicting tools.
    #[error("Registration error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors that terminate the serve loop.
///
/// Everything else is reported to the host as a structured error response.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The transport could not be read or written.
    #[error("Transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    /// A response could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A handler reported an unrecoverable failure.
    #[error("Fatal handler error: {0}")]
    Fatal(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
