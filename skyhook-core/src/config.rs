//! Process configuration.
//!
//! [`ServerConfig`] is built once at startup (normally from the environment)
//! and shared by `Arc` with the runtime, the mutation gate and every handler.
//! Nothing reads configuration from ambient globals after startup.

use std::time::Duration;

use crate::cache::{CacheConfig, Tier};
use crate::tool::ToolError;

pub const DEFAULT_TOOL_PREFIX: &str = "skyhook";
pub const DEFAULT_SERVICE_NAME: &str = "skyhook";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Errors raised while reading configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected a boolean (true/false/1/0/yes/no/on/off), got '{value}'")]
    InvalidBool { var: String, value: String },

    #[error("{var}: expected a number of seconds, got '{value}'")]
    InvalidNumber { var: String, value: String },

    #[error("tool prefix '{0}' is invalid: it must be non-empty and contain no ':'")]
    InvalidPrefix(String),
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Name reported by `initialize` and `server:info`
    pub service_name: String,
    /// Prefix token of every tool name (`<prefix>_service_action`)
    pub tool_prefix: String,
    /// Authentication profile injected when a call omits `profile`
    pub default_profile: Option<String>,
    /// Region injected when a call omits `region`
    pub default_region: Option<String>,
    /// Mutating tools require `confirm: true`
    pub require_confirmation: bool,
    /// Mutating tools may run at all
    pub allow_mutations: bool,
    /// Reject requests that arrive before `initialize`
    pub strict_handshake: bool,
    pub cache: CacheConfig,
    /// `tracing-subscriber` filter directive
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            tool_prefix: DEFAULT_TOOL_PREFIX.to_string(),
            default_profile: None,
            default_region: None,
            require_confirmation: true,
            allow_mutations: false,
            strict_handshake: false,
            cache: CacheConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = get("SKYHOOK_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(prefix) = get("SKYHOOK_TOOL_PREFIX") {
            config.tool_prefix = prefix;
        }
        config.default_profile = get("SKYHOOK_PROFILE").or_else(|| get("AWS_PROFILE"));
        config.default_region = get("SKYHOOK_REGION")
            .or_else(|| get("AWS_REGION"))
            .or_else(|| get("AWS_DEFAULT_REGION"));

        if let Some(v) = get("SKYHOOK_REQUIRE_CONFIRM") {
            config.require_confirmation = parse_bool("SKYHOOK_REQUIRE_CONFIRM", &v)?;
        }
        if let Some(v) = get("SKYHOOK_ALLOW_MUTATIONS") {
            config.allow_mutations = parse_bool("SKYHOOK_ALLOW_MUTATIONS", &v)?;
        }
        if let Some(v) = get("SKYHOOK_STRICT_HANDSHAKE") {
            config.strict_handshake = parse_bool("SKYHOOK_STRICT_HANDSHAKE", &v)?;
        }

        for (tier, var) in [
            (Tier::Static, "SKYHOOK_CACHE_TTL_STATIC"),
            (Tier::Config, "SKYHOOK_CACHE_TTL_CONFIG"),
            (Tier::Operational, "SKYHOOK_CACHE_TTL_OPERATIONAL"),
            (Tier::Metrics, "SKYHOOK_CACHE_TTL_METRICS"),
        ] {
            if let Some(v) = get(var) {
                config.cache = config.cache.clone().with_ttl(tier, parse_secs(var, &v)?);
            }
        }

        if let Some(filter) = get("SKYHOOK_LOG").or_else(|| get("RUST_LOG")) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_prefix.is_empty() || self.tool_prefix.contains(':') {
            return Err(ConfigError::InvalidPrefix(self.tool_prefix.clone()));
        }
        Ok(())
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = prefix.into();
        self
    }

    pub fn with_default_profile(mut self, profile: impl Into<String>) -> Self {
        self.default_profile = Some(profile.into());
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    pub fn with_require_confirmation(mut self, require: bool) -> Self {
        self.require_confirmation = require;
        self
    }

    pub fn with_allow_mutations(mut self, allow: bool) -> Self {
        self.allow_mutations = allow;
        self
    }

    pub fn with_strict_handshake(mut self, strict: bool) -> Self {
        self.strict_handshake = strict;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Process-level mutation gate for use inside mutating handlers.
    pub fn ensure_mutations_allowed(&self, tool: &str) -> Result<(), ToolError> {
        if self.allow_mutations {
            Ok(())
        } else {
            tracing::warn!(tool, "mutating call refused: mutations are disabled");
            Err(ToolError::MutationsDisabled(tool.to_string()))
        }
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: value.to_string(),
        })
}
