//! Signed AWS JSON API client and the factory the client pool uses to build it.
//!
//! One [`AwsClient`] exists per (service, region, profile). Constructing it
//! resolves credentials through the standard AWS chain, which is the expensive
//! part. The client keeps those credentials, signs each request with SigV4 and
//! posts it to the service's JSON endpoint.

use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use aws_types::region::Region;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use skyhook_core::{ClientFactory, ClientInitError, ClientKey, ToolError, DEFAULT_PROFILE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1; charset=utf-8";
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Builds [`AwsClient`]s for the AWS client pool.
#[derive(Clone)]
pub struct AwsClientFactory {
    timeout: Duration,
    service_targets: Arc<HashMap<String, String>>,
    credentials_provider: Option<Arc<dyn ProvideCredentials>>,
    endpoint_override: Option<String>,
}

/// Builder for [`AwsClientFactory`].
///
/// ```no_run
/// use skyhook_tools::aws::AwsClientFactory;
/// use std::time::Duration;
///
/// let factory = AwsClientFactory::builder()
///     .timeout(Duration::from_secs(120))
///     .with_service_target("custom-service", "CustomService_20240101")
///     .build();
/// ```
#[derive(Default)]
pub struct AwsClientFactoryBuilder {
    timeout: Option<Duration>,
    custom_service_targets: HashMap<String, String>,
    credentials_provider: Option<Arc<dyn ProvideCredentials>>,
    endpoint_override: Option<String>,
}

impl AwsClientFactoryBuilder {
    /// Set the HTTP request timeout (default: 60 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a service target prefix for the `x-amz-target` header.
    pub fn with_service_target(
        mut self,
        service: impl Into<String>,
        target_prefix: impl Into<String>,
    ) -> Self {
        self.custom_service_targets
            .insert(service.into(), target_prefix.into());
        self
    }

    /// Use fixed credentials instead of the default credential chain.
    pub fn credentials_provider(mut self, provider: Arc<dyn ProvideCredentials>) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Send every request to this base URL instead of the public endpoint.
    pub fn endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn build(self) -> AwsClientFactory {
        let mut service_targets = default_service_targets();
        service_targets.extend(self.custom_service_targets);

        AwsClientFactory {
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            service_targets: Arc::new(service_targets),
            credentials_provider: self.credentials_provider,
            endpoint_override: self.endpoint_override,
        }
    }
}

impl Default for AwsClientFactory {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AwsClientFactory {
    pub fn builder() -> AwsClientFactoryBuilder {
        AwsClientFactoryBuilder::default()
    }

    /// Known services and their `x-amz-target` prefixes
    pub fn service_targets(&self) -> &HashMap<String, String> {
        &self.service_targets
    }

    async fn resolve_credentials(
        &self,
        key: &ClientKey,
    ) -> Result<Arc<dyn ProvideCredentials>, ClientInitError> {
        if let Some(provider) = &self.credentials_provider {
            return Ok(Arc::clone(provider));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(key.region.clone()));
        if key.profile != DEFAULT_PROFILE {
            loader = loader.profile_name(&key.profile);
        }
        let config = loader.load().await;

        config
            .credentials_provider()
            .map(|provider| Arc::new(provider) as Arc<dyn ProvideCredentials>)
            .ok_or_else(|| {
                ClientInitError::new(
                    key,
                    "no AWS credentials found; configure environment variables, ~/.aws/credentials or an IAM role",
                )
            })
    }
}

impl ClientFactory for AwsClientFactory {
    type Client = AwsClient;

    async fn create(&self, key: &ClientKey) -> Result<AwsClient, ClientInitError> {
        let provider = self.resolve_credentials(key).await?;

        // Resolve once up front so bad profiles fail here rather than per call
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| ClientInitError::new(key, format!("failed to load credentials: {e}")))?;

        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientInitError::new(key, format!("failed to create HTTP client: {e}")))?;

        let endpoint = self
            .endpoint_override
            .clone()
            .unwrap_or_else(|| endpoint_for(&key.client_type, &key.region));
        let host = host_header(&endpoint)
            .ok_or_else(|| ClientInitError::new(key, format!("invalid endpoint URL '{endpoint}'")))?;
        let target_prefix = self
            .service_targets
            .get(&key.client_type)
            .cloned()
            .unwrap_or_else(|| key.client_type.clone());

        tracing::debug!(%key, %endpoint, "constructed AWS client");
        Ok(AwsClient {
            http,
            provider,
            credentials: Mutex::new(credentials),
            service: key.client_type.clone(),
            region: key.region.clone(),
            endpoint,
            host,
            target_prefix,
        })
    }
}

/// `host[:port]` of an endpoint URL, as it goes in the signed `host` header.
fn host_header(endpoint: &str) -> Option<String> {
    let url = url::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// True when `credentials` expire within [`REFRESH_MARGIN`] of `now`.
fn expires_soon(credentials: &Credentials, now: SystemTime) -> bool {
    credentials
        .expiry()
        .is_some_and(|expiry| expiry <= now + REFRESH_MARGIN)
}

/// SigV4-signing client for one service in one region.
///
/// Holds the credentials resolved at construction and only goes back to the
/// provider when they are about to expire.
pub struct AwsClient {
    http: Client,
    provider: Arc<dyn ProvideCredentials>,
    credentials: Mutex<Credentials>,
    service: String,
    region: String,
    endpoint: String,
    host: String,
    target_prefix: String,
}

impl AwsClient {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `operation` with a JSON parameter object.
    ///
    /// Non-JSON success bodies are returned as `{"raw_response": <body>}`.
    pub async fn call(&self, operation: &str, parameters: &Value) -> Result<Value, ToolError> {
        let body = serde_json::to_string(parameters)?;
        let credentials = self.credentials().await?;
        let headers = self
            .signed_headers(&credentials, operation, &body)
            .map_err(|e| {
                ToolError::from(format!(
                    "Failed to sign {}.{} for {}: {}",
                    self.service, operation, self.region, e
                ))
            })?;

        let response = self
            .http
            .post(&self.endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                ToolError::from(format!(
                    "AWS request failed for {}.{} in {}: {}",
                    self.service, operation, self.region, e
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ToolError::from(format!(
                "Failed to read response from {}.{}: {}",
                self.service, operation, e
            ))
        })?;

        if !status.is_success() {
            return Err(parse_aws_error(
                &self.service,
                operation,
                &self.region,
                status,
                &body,
            ));
        }

        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "raw_response": body })))
    }

    /// Cached credentials, refreshed from the provider near expiry.
    async fn credentials(&self) -> Result<Credentials, ToolError> {
        let cached = self.credentials.lock().clone();
        if !expires_soon(&cached, SystemTime::now()) {
            return Ok(cached);
        }

        tracing::debug!(service = %self.service, region = %self.region, "refreshing AWS credentials");
        let fresh = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| ToolError::from(format!("Failed to refresh AWS credentials: {e}")))?;
        *self.credentials.lock() = fresh.clone();
        Ok(fresh)
    }

    /// Request headers for one call, including the SigV4 `authorization` and
    /// `x-amz-date` headers.
    fn signed_headers(
        &self,
        credentials: &Credentials,
        operation: &str,
        body: &str,
    ) -> Result<HeaderMap, String> {
        let target = format!("{}.{}", self.target_prefix, operation);
        let mut unsigned = vec![
            ("host", self.host.as_str()),
            ("content-type", JSON_CONTENT_TYPE),
            ("x-amz-target", target.as_str()),
        ];
        if let Some(token) = credentials.session_token() {
            unsigned.push(("x-amz-security-token", token));
        }

        let identity = credentials.clone().into();
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| e.to_string())?;
        let signable = SignableRequest::new(
            "POST",
            self.endpoint.as_str(),
            unsigned.iter().copied(),
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|e| e.to_string())?;
        let (instructions, _signature) = sign(signable, &params.into())
            .map_err(|e| e.to_string())?
            .into_parts();

        let mut headers = HeaderMap::new();
        for (name, value) in unsigned.into_iter().chain(instructions.headers()) {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
            let value = HeaderValue::from_str(value).map_err(|e| format!("{name}: {e}"))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Turn an AWS error body into an actionable handler error.
///
/// JSON bodies contribute `<code> - <message>`, read from the top level or a
/// nested `Error` object. Other bodies are quoted as-is.
pub fn parse_aws_error(
    service: &str,
    operation: &str,
    region: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> ToolError {
    let detail = match serde_json::from_str::<Value>(body) {
        Ok(error) if error.is_object() => {
            let field = |names: &[&str]| {
                names.iter().find_map(|name| {
                    error
                        .get(*name)
                        .or_else(|| error.get("Error").and_then(|e| e.get(*name)))
                        .and_then(Value::as_str)
                })
            };
            // `__type` may be namespaced: "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException"
            let code = field(&["__type", "Code", "code"])
                .and_then(|code| code.rsplit('#').next())
                .unwrap_or("Unknown");
            let message = field(&["message", "Message"]).unwrap_or(body);
            format!("{code} - {message}")
        }
        _ => body.to_string(),
    };

    ToolError::from(format!(
        "AWS API error for {service}.{operation} in {region} (HTTP {status}): {detail}"
    ))
}

/// Public endpoint URL for a service in a region.
pub fn endpoint_for(service: &str, region: &str) -> String {
    match service {
        "iam" => "https://iam.amazonaws.com".to_string(),
        "sts" if region == "us-east-1" => "https://sts.amazonaws.com".to_string(),
        "route53" | "cloudfront" => format!("https://{}.amazonaws.com", service),
        _ => format!("https://{}.{}.amazonaws.com", service, region),
    }
}

/// Default `x-amz-target` prefixes for JSON-protocol services.
pub fn default_service_targets() -> HashMap<String, String> {
    [
        ("dynamodb", "DynamoDB_20120810"),
        ("kinesis", "Kinesis_20131202"),
        ("logs", "Logs_20140328"),
        ("events", "AWSEvents"),
        ("lambda", "AWSLambda"),
        ("sts", "AWSSecurityTokenServiceV20110615"),
        ("sqs", "AmazonSQS"),
        ("sns", "AmazonSimpleNotificationService"),
        ("secretsmanager", "secretsmanager"),
        ("ssm", "AmazonSSM"),
        ("kms", "TrentService"),
        ("cognito-idp", "AWSCognitoIdentityProviderService"),
        ("cloudwatch", "GraniteServiceVersion20100801"),
        ("ecr", "AmazonEC2ContainerRegistry_V20150921"),
        ("ecs", "AmazonEC2ContainerServiceV20141113"),
        ("cloudformation", "CloudFormation"),
        ("codebuild", "CodeBuild_20161006"),
        ("stepfunctions", "AWSStepFunctions"),
        ("glue", "AWSGlue"),
        ("athena", "AmazonAthena"),
    ]
    .into_iter()
    .map(|(service, target)| (service.to_string(), target.to_string()))
    .collect()
}
