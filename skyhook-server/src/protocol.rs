//! JSON-RPC 2.0 wire types for the line-delimited transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use skyhook_core::{DispatchError, ToolDescriptor, ToolResult, CONFIRM_KEY};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision reported by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications. [`JsonRpcRequest::parse`] keeps an explicit
    /// `null` as `Some(Value::Null)`.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Parse one transport line.
    ///
    /// Unparsable JSON yields a parse error; well-formed JSON that is not a
    /// request yields an invalid-request error echoing whatever id it carried.
    pub fn parse(line: &str) -> Result<Self, JsonRpcResponse> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| JsonRpcResponse::failure(Value::Null, &DispatchError::Parse(e.to_string())))?;

        let has_id = value.as_object().is_some_and(|o| o.contains_key("id"));
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let mut request: Self = serde_json::from_value(value).map_err(|e| {
            JsonRpcResponse::failure(id.clone(), &DispatchError::InvalidRequest(e.to_string()))
        })?;
        // `"id": null` is still a request; only a missing id marks a notification
        if has_id && request.id.is_none() {
            request.id = Some(Value::Null);
        }

        if request.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcResponse::failure(
                id,
                &DispatchError::InvalidRequest(format!(
                    "unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }
        Ok(request)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &DispatchError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code: err.code(),
                message: err.to_string(),
                data: Some(err.to_error_data()),
            }),
        }
    }
}

/// `tools/call` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl CallToolParams {
    /// The argument map; a missing or `null` map is empty.
    pub fn argument_map(&self) -> Result<Map<String, Value>, DispatchError> {
        match &self.arguments {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(DispatchError::InvalidParams(
                "arguments must be an object".to_string(),
            )),
        }
    }
}

/// One entry of the `tools/list` result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub read_only_hint: bool,
    pub destructive_hint: bool,
}

impl From<&ToolDescriptor> for ToolInfo {
    fn from(descriptor: &ToolDescriptor) -> Self {
        let mut input_schema = descriptor.parameters().clone();
        if descriptor.is_mutating() {
            advertise_confirm(&mut input_schema);
        }
        Self {
            name: descriptor.name().to_string(),
            description: descriptor.listing_description().to_string(),
            input_schema,
            annotations: ToolAnnotations {
                read_only_hint: !descriptor.is_mutating(),
                destructive_hint: descriptor.is_mutating(),
            },
        }
    }
}

/// Add the `confirm` flag to a mutating tool's published schema.
fn advertise_confirm(schema: &mut Value) {
    let Some(object) = schema.as_object_mut() else {
        return;
    };
    let properties = object
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(properties) = properties.as_object_mut() {
        properties.entry(CONFIRM_KEY).or_insert_with(|| {
            json!({
                "type": "boolean",
                "description": "Set to true to confirm this state-changing call"
            })
        });
    }
}

/// Render a handler result as a `tools/call` result.
pub fn call_result(result: ToolResult) -> Value {
    let text = result.as_text();
    let mut body = json!({
        "content": [{"type": "text", "text": text}],
        "isError": false,
    });
    if let ToolResult::Json(value) = result {
        body["structuredContent"] = value;
    }
    body
}
