use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use skyhook_core::{
    hash_key, ClientKey, ClientManager, SharedState, Tier, Tool, ToolError, ToolResult,
    DEFAULT_PROFILE,
};

use super::client::{AwsClient, AwsClientFactory};

/// Operation name prefixes that change AWS state.
const MUTATIVE_OPERATIONS: &[&str] = &[
    "Create",
    "Put",
    "Delete",
    "Update",
    "Terminate",
    "Revoke",
    "Disable",
    "Deregister",
    "Stop",
    "Add",
    "Modify",
    "Remove",
    "Attach",
    "Detach",
    "Start",
    "Enable",
    "Register",
    "Set",
    "Associate",
    "Disassociate",
    "Allocate",
    "Release",
    "Cancel",
    "Reboot",
    "Accept",
    "Invoke",
    "Send",
    "Publish",
    "Tag",
    "Untag",
];

pub fn is_mutative_operation(operation: &str) -> bool {
    MUTATIVE_OPERATIONS
        .iter()
        .any(|prefix| operation.starts_with(prefix))
}

/// Cache tier for a read-only operation's response.
pub fn tier_for(service: &str, operation: &str) -> Tier {
    if service == "cloudwatch" || operation.contains("Metric") {
        Tier::Metrics
    } else if service == "iam" || operation.contains("Policy") || operation.contains("Config") {
        Tier::Config
    } else {
        Tier::Operational
    }
}

/// Input shared by the query and execute tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AwsCallInput {
    /// Service name as it appears in endpoint URLs (e.g. "dynamodb", "sts", "logs").
    pub service: String,

    /// API operation in PascalCase (e.g. "DescribeTable", "GetCallerIdentity").
    pub operation: String,

    /// Operation parameters, sent as the JSON request body.
    #[serde(default = "empty_object")]
    pub parameters: Value,

    /// AWS region; defaults to the server's configured region.
    #[serde(default)]
    pub region: Option<String>,

    /// Credentials profile; defaults to the server's configured profile.
    #[serde(default)]
    pub profile: Option<String>,

    /// Short human-readable description of the call, for logs.
    #[serde(default)]
    pub label: Option<String>,
}

fn empty_object() -> Value {
    json!({})
}

impl AwsCallInput {
    fn validate(&self) -> Result<(), ToolError> {
        if self.service.trim().is_empty() {
            return Err(ToolError::InvalidInput(
                "service cannot be empty. Use lowercase AWS service names like 'sts', 'dynamodb'."
                    .to_string(),
            ));
        }
        if self.operation.trim().is_empty() {
            return Err(ToolError::InvalidInput(
                "operation cannot be empty. Use PascalCase operation names like 'ListTables'."
                    .to_string(),
            ));
        }
        if !self.parameters.is_object() {
            return Err(ToolError::InvalidInput(format!(
                "parameters must be a JSON object, got: {}",
                json_type(&self.parameters)
            )));
        }
        Ok(())
    }

    fn client_key(&self) -> Result<ClientKey, ToolError> {
        let region = self
            .region
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                ToolError::InvalidInput(
                    "region is required: pass \"region\" or set SKYHOOK_REGION".to_string(),
                )
            })?;
        let profile = self.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        Ok(ClientKey::new(self.service.as_str(), region, profile))
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.operation)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// State every AWS tool shares.
#[derive(Clone)]
pub(crate) struct AwsContext {
    pub state: SharedState,
    pub clients: Arc<ClientManager<AwsClientFactory>>,
}

impl AwsContext {
    async fn client(&self, key: &ClientKey) -> Result<Arc<AwsClient>, ToolError> {
        Ok(self.clients.get(key).await?)
    }
}

/// Read-only AWS call with response caching.
pub struct AwsQueryTool {
    name: String,
    ctx: AwsContext,
}

impl AwsQueryTool {
    pub(crate) fn new(prefix: &str, ctx: AwsContext) -> Self {
        Self {
            name: format!("{prefix}_aws_query"),
            ctx,
        }
    }
}

impl Tool for AwsQueryTool {
    type Input = AwsCallInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Call a read-only AWS API operation (Describe*, List*, Get*, ...) on any JSON-protocol \
         service. Responses are cached briefly. State-changing operations are refused; use the \
         aws execute tool for those."
    }

    async fn execute(&self, input: AwsCallInput) -> Result<ToolResult, ToolError> {
        input.validate()?;
        if is_mutative_operation(&input.operation) {
            return Err(ToolError::InvalidInput(format!(
                "{} changes state; call it through the aws execute tool with confirm=true",
                input.operation
            )));
        }
        let key = input.client_key()?;
        let tier = tier_for(&input.service, &input.operation);
        let cache_key = hash_key(&json!({
            "service": input.service,
            "operation": input.operation,
            "parameters": input.parameters,
            "region": key.region,
            "profile": key.profile,
        }));

        tracing::debug!(label = input.label(), %key, operation = %input.operation, "aws query");
        let response = self
            .ctx
            .state
            .cache
            .get_or_try_insert_with(tier, &cache_key, || async {
                let client = self.ctx.client(&key).await?;
                client.call(&input.operation, &input.parameters).await
            })
            .await?;

        Ok(ToolResult::Json(json!({
            "service": input.service,
            "operation": input.operation,
            "region": key.region,
            "label": input.label(),
            "response": response,
        })))
    }
}

/// State-changing AWS call. Gated by the server's mutation settings.
pub struct AwsExecuteTool {
    name: String,
    ctx: AwsContext,
}

impl AwsExecuteTool {
    pub(crate) fn new(prefix: &str, ctx: AwsContext) -> Self {
        Self {
            name: format!("{prefix}_aws_execute"),
            ctx,
        }
    }
}

impl Tool for AwsExecuteTool {
    type Input = AwsCallInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Call a state-changing AWS API operation (Create*, Delete*, Update*, ...). Requires \
         mutations to be enabled on the server and confirm=true on the call."
    }

    fn mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: AwsCallInput) -> Result<ToolResult, ToolError> {
        self.ctx.state.config.ensure_mutations_allowed(&self.name)?;
        input.validate()?;
        let key = input.client_key()?;

        tracing::info!(label = input.label(), %key, operation = %input.operation, "aws execute");
        let client = self.ctx.client(&key).await?;
        let response = client.call(&input.operation, &input.parameters).await?;

        // Anything read before the change may now be stale
        let dropped = self.ctx.state.cache.clear_tier(Tier::Operational)
            + self.ctx.state.cache.clear_tier(Tier::Config);
        tracing::debug!(dropped, "invalidated cached reads after mutation");

        Ok(ToolResult::Json(json!({
            "service": input.service,
            "operation": input.operation,
            "region": key.region,
            "label": input.label(),
            "mutative": is_mutative_operation(&input.operation),
            "response": response,
        })))
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListServicesInput {}

/// Lists services with a known `x-amz-target` prefix.
pub struct AwsListServicesTool {
    name: String,
    ctx: AwsContext,
}

impl AwsListServicesTool {
    pub(crate) fn new(prefix: &str, ctx: AwsContext) -> Self {
        Self {
            name: format!("{prefix}_aws_list_services"),
            ctx,
        }
    }
}

impl Tool for AwsListServicesTool {
    type Input = ListServicesInput;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "List AWS services the query and execute tools know the JSON target prefix for"
    }

    async fn execute(&self, _input: ListServicesInput) -> Result<ToolResult, ToolError> {
        let services = self
            .ctx
            .state
            .cache
            .get_or_try_insert_with(Tier::Static, "aws:services", || async {
                let mut services: Vec<_> = self
                    .ctx
                    .clients
                    .factory()
                    .service_targets()
                    .iter()
                    .map(|(service, target)| json!({"service": service, "target": target}))
                    .collect();
                services.sort_by(|a, b| a["service"].as_str().cmp(&b["service"].as_str()));
                Ok::<_, ToolError>(Value::Array(services))
            })
            .await?;

        Ok(ToolResult::Json(json!({ "services": services })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> AwsCallInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_is_mutative_operation() {
        for op in ["CreateTable", "DeleteItem", "PutObject", "TerminateInstances", "TagResource"] {
            assert!(is_mutative_operation(op), "{op}");
        }
        for op in ["GetCallerIdentity", "ListTables", "DescribeInstances", "Scan", "Query"] {
            assert!(!is_mutative_operation(op), "{op}");
        }
    }

    #[test]
    fn test_tier_for() {
        assert_eq!(tier_for("cloudwatch", "ListMetrics"), Tier::Metrics);
        assert_eq!(tier_for("ecs", "GetMetricData"), Tier::Metrics);
        assert_eq!(tier_for("iam", "ListRoles"), Tier::Config);
        assert_eq!(tier_for("lambda", "GetFunctionConfiguration"), Tier::Config);
        assert_eq!(tier_for("ecs", "DescribeTasks"), Tier::Operational);
    }

    #[test]
    fn test_parameters_default_to_empty_object() {
        let call = input(json!({"service": "sts", "operation": "GetCallerIdentity"}));
        assert_eq!(call.parameters, json!({}));
        assert!(call.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let err = input(json!({"service": "", "operation": "ListTables"}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("service"));

        let err = input(json!({"service": "sts", "operation": " "}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("operation"));

        let err = input(json!({"service": "sts", "operation": "X", "parameters": [1]}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_client_key_uses_default_profile() {
        let key = input(json!({"service": "dynamodb", "operation": "ListTables", "region": "us-1"}))
            .client_key()
            .unwrap();
        assert_eq!(key, ClientKey::new("dynamodb", "us-1", DEFAULT_PROFILE));
    }

    #[test]
    fn test_client_key_requires_region() {
        let err = input(json!({"service": "dynamodb", "operation": "ListTables"}))
            .client_key()
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(msg) if msg.contains("SKYHOOK_REGION")));
    }
}
