//! User-visible error taxonomy.
//!
//! Every failure below the runtime boundary is converted into a
//! [`DispatchError`], which maps onto a JSON-RPC error code and a category that
//! tells the host whether to fix configuration, retry, or fix the request.

use serde::Serialize;
use serde_json::{json, Value};

use crate::client::ClientInitError;
use crate::gate::GateError;
use crate::registry::RegistryError;
use crate::tool::ToolError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const PROTOCOL_SEQUENCE: i64 = -32002;
pub const HANDLER_ERROR: i64 = -32000;
pub const MUTATIONS_DISABLED: i64 = -32010;
pub const CONFIRMATION_REQUIRED: i64 = -32011;
pub const CLIENT_INIT: i64 = -32020;

/// What the host should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Fix process configuration or call flags, then retry
    Configuration,
    /// Retry as-is
    Transient,
    /// Fix the request
    Programmer,
}

/// Errors reported to the host in place of a result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("'{0}' received before initialize")]
    ProtocolSequence(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("mutations are disabled; '{0}' was not executed")]
    MutationsDisabled(String),

    #[error("'{0}' changes external state and requires confirmation")]
    ConfirmationRequired(String),

    #[error(transparent)]
    ClientInit(#[from] ClientInitError),

    #[error("{0}")]
    Handler(String),
}

impl DispatchError {
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::UnknownTool(_) => INVALID_PARAMS,
            Self::ProtocolSequence(_) => PROTOCOL_SEQUENCE,
            Self::MutationsDisabled(_) => MUTATIONS_DISABLED,
            Self::ConfirmationRequired(_) => CONFIRMATION_REQUIRED,
            Self::ClientInit(_) => CLIENT_INIT,
            Self::Handler(_) => HANDLER_ERROR,
        }
    }

    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::ProtocolSequence(_) => "protocol_sequence",
            Self::UnknownTool(_) => "unknown_tool",
            Self::MutationsDisabled(_) => "mutations_disabled",
            Self::ConfirmationRequired(_) => "confirmation_required",
            Self::ClientInit(_) => "client_init",
            Self::Handler(_) => "handler_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MutationsDisabled(_) | Self::ConfirmationRequired(_) => {
                ErrorCategory::Configuration
            }
            Self::ClientInit(_) | Self::Handler(_) => ErrorCategory::Transient,
            _ => ErrorCategory::Programmer,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Remediation hint for errors the host can act on
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::MutationsDisabled(_) => Some(
                "set SKYHOOK_ALLOW_MUTATIONS=true and restart the server to enable mutating tools"
                    .to_string(),
            ),
            Self::ConfirmationRequired(_) => {
                Some("repeat the call with \"confirm\": true in the arguments".to_string())
            }
            Self::ProtocolSequence(_) => Some("send 'initialize' first".to_string()),
            Self::UnknownTool(_) => Some("call tools/list for the available tools".to_string()),
            Self::ClientInit(_) => {
                Some("check credentials, profile and region, then retry".to_string())
            }
            _ => None,
        }
    }

    /// Value for the `data` member of a JSON-RPC error object
    pub fn to_error_data(&self) -> Value {
        let mut data = json!({
            "kind": self.kind(),
            "category": self.category(),
            "retryable": self.is_retryable(),
        });
        if let Some(hint) = self.hint() {
            data["hint"] = Value::String(hint);
        }
        data
    }
}

impl From<GateError> for DispatchError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MutationsDisabled(tool) => Self::MutationsDisabled(tool),
            GateError::ConfirmationRequired(tool) => Self::ConfirmationRequired(tool),
        }
    }
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownTool(name) => Self::UnknownTool(name),
            RegistryError::DuplicateName(_) => Self::InvalidRequest(err.to_string()),
        }
    }
}

impl From<ToolError> for DispatchError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput(msg) => Self::InvalidParams(msg),
            ToolError::ClientInit(e) => Self::ClientInit(e),
            ToolError::MutationsDisabled(tool) => Self::MutationsDisabled(tool),
            other => Self::Handler(other.to_string()),
        }
    }
}
