use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

use crate::client::ClientInitError;

/// Result types that tools can return.
///
/// Service tools usually answer with [`ToolResult::Json`]; the runtime also
/// exposes JSON results as structured content to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolResult {
    /// Plain text response
    Text(String),

    /// Structured JSON data (mapping, list or scalar)
    Json(Value),
}

impl ToolResult {
    /// Create a JSON result from any serializable type
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Create a text result from a string
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Render the result as text. JSON is serialized compactly.
    pub fn as_text(&self) -> String {
        match self {
            ToolResult::Text(s) => s.clone(),
            ToolResult::Json(v) => v.to_string(),
        }
    }

    /// Get a reference to the text content if this is a Text variant
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolResult::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get a reference to the JSON content if this is a Json variant
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ToolResult::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a JSON value; text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            ToolResult::Text(s) => Value::String(s),
            ToolResult::Json(v) => v,
        }
    }
}

impl From<String> for ToolResult {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolResult {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Value> for ToolResult {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

/// Errors that can occur during tool execution
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Arguments did not match the tool's schema or failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external client the tool needs could not be constructed
    #[error(transparent)]
    ClientInit(#[from] ClientInitError),

    /// The tool changes external state and mutations are disabled for this process
    #[error("mutations are disabled; '{0}' was not executed")]
    MutationsDisabled(String),

    /// The handler hit an unrecoverable condition and asks the server to stop
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("{0}")]
    Custom(String),
}

impl ToolError {
    /// Returns true if the handler asked for process termination
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Custom(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Custom(s.to_string())
    }
}

/// Trait for implementing tools exposed by the server.
///
/// Tools define an input type with `#[derive(Deserialize, JsonSchema)]` so the
/// parameter schema published in `tools/list` is generated from the Rust type.
///
/// # Example
///
/// ```rust
/// use skyhook_core::{Tool, ToolResult, ToolError};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct DescribeInput {
///     /// Instance identifier
///     instance_id: String,
/// }
///
/// struct DescribeInstance;
///
/// impl Tool for DescribeInstance {
///     type Input = DescribeInput;
///
///     fn name(&self) -> &str { "skyhook_compute_describe_instance" }
///     fn description(&self) -> &str { "Describe a compute instance" }
///
///     fn execute(&self, input: Self::Input) -> impl std::future::Future<Output = Result<ToolResult, ToolError>> + Send {
///         async move {
///             Ok(ToolResult::json(serde_json::json!({ "id": input.instance_id }))?)
///         }
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The input type for this tool. Must implement `Deserialize` and `JsonSchema`.
    type Input: DeserializeOwned + JsonSchema;

    /// The canonical name of the tool (e.g. `skyhook_compute_list_instances`)
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// Whether invoking the tool changes external state.
    fn mutating(&self) -> bool {
        false
    }

    /// Execute the tool with typed input
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = Result<ToolResult, ToolError>> + Send;

    /// Get the JSON schema for this tool's input.
    ///
    /// Generated at runtime from the `JsonSchema` derive on `Input`.
    fn input_schema(&self) -> Value {
        schemars::schema_for!(Self::Input).to_value()
    }
}

/// Object-safe trait for dynamic tool dispatch (used by the registry).
///
/// Implement `Tool` instead and use [`box_tool()`] to convert.
pub trait DynTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn mutating(&self) -> bool;
    fn execute_raw(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>>;
}

/// Convert a `Tool` into a type-erased `Box<dyn DynTool>` for storage in collections.
pub fn box_tool<T: Tool + 'static>(tool: T) -> Box<dyn DynTool> {
    Box::new(ToolWrapper(tool))
}

/// Create a `Vec<Box<dyn DynTool>>` from heterogeneous tool types.
///
/// ```ignore
/// use skyhook_core::box_tools;
///
/// let batch = box_tools![ListInstances, StartInstance, StopInstance];
/// ```
#[macro_export]
macro_rules! box_tools {
    ($($tool:expr),* $(,)?) => {
        vec![$($crate::tool::box_tool($tool)),*]
    };
}

struct ToolWrapper<T>(T);

impl<T: Tool + 'static> DynTool for ToolWrapper<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn input_schema(&self) -> Value {
        self.0.input_schema()
    }

    fn mutating(&self) -> bool {
        self.0.mutating()
    }

    fn execute_raw(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let typed_input: T::Input = serde_json::from_value(input)
                .map_err(|e| ToolError::InvalidInput(e.to_string()))?;

            self.0.execute(typed_input).await
        })
    }
}
