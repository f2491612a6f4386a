//! Process-wide default arguments.

use serde_json::{Map, Value};

use crate::config::ServerConfig;

/// Argument key carrying the authentication profile
pub const PROFILE_KEY: &str = "profile";

/// Argument key carrying the region
pub const REGION_KEY: &str = "region";

/// Merges process-wide defaults into per-call argument maps.
///
/// A key the caller already supplied, including an explicit `null`, is never
/// overwritten. Injection is idempotent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultInjector {
    defaults: Map<String, Value>,
}

impl DefaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an injector carrying the configured profile and region.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut injector = Self::new();
        if let Some(profile) = &config.default_profile {
            injector = injector.with_default(PROFILE_KEY, profile.as_str());
        }
        if let Some(region) = &config.default_region {
            injector = injector.with_default(REGION_KEY, region.as_str());
        }
        injector
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Return a copy of `arguments` with missing defaults filled in.
    pub fn inject(&self, arguments: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = arguments.clone();
        for (key, value) in &self.defaults {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn injector() -> DefaultInjector {
        DefaultInjector::new()
            .with_default(PROFILE_KEY, "DEFAULT")
            .with_default(REGION_KEY, "us-1")
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fills_missing_keys() {
        let args = map(json!({"instance_id": "i-1"}));
        let merged = injector().inject(&args);
        assert_eq!(
            Value::Object(merged),
            json!({"instance_id": "i-1", "profile": "DEFAULT", "region": "us-1"})
        );
    }

    #[test]
    fn test_never_overwrites_caller_values() {
        let args = map(json!({"region": "eu-2", "profile": null}));
        let merged = injector().inject(&args);
        assert_eq!(merged["region"], json!("eu-2"));
        assert_eq!(merged["profile"], Value::Null);
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            json!({}),
            json!({"region": "eu-2"}),
            json!({"profile": null, "x": [1, 2]}),
            json!({"profile": "p", "region": "r", "confirm": true}),
        ];
        let injector = injector();
        for case in cases {
            let args = map(case);
            let once = injector.inject(&args);
            let twice = injector.inject(&once);
            assert_eq!(once, twice);
            for (key, value) in &args {
                assert_eq!(once.get(key), Some(value));
            }
        }
    }

    #[test]
    fn test_does_not_mutate_input() {
        let args = map(json!({}));
        let _ = injector().inject(&args);
        assert!(args.is_empty());
    }

    #[test]
    fn test_from_config_skips_unset_defaults() {
        let config = ServerConfig::default().with_default_region("ap-3");
        let injector = DefaultInjector::from_config(&config);
        assert_eq!(Value::Object(injector.defaults().clone()), json!({"region": "ap-3"}));
    }
}
