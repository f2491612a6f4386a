//! Mutation gating for state-changing tools.
//!
//! Two gates compose, checked in order before a mutating handler runs:
//!
//! 1. process level: `allow_mutations` must be set in [`ServerConfig`];
//! 2. call level: with `require_confirmation` set, the call must carry `confirm: true`.
//!
//! Either gate failing short-circuits; the handler is never invoked.

use serde_json::{Map, Value};

use crate::config::ServerConfig;

/// Argument key hosts use to confirm a mutating call
pub const CONFIRM_KEY: &str = "confirm";

/// Rejection from the mutation gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("mutations are disabled; '{0}' was not executed")]
    MutationsDisabled(String),

    #[error("'{0}' changes external state and requires confirmation")]
    ConfirmationRequired(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationGate {
    allow_mutations: bool,
    require_confirmation: bool,
}

impl MutationGate {
    pub fn new(allow_mutations: bool, require_confirmation: bool) -> Self {
        Self {
            allow_mutations,
            require_confirmation,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.allow_mutations, config.require_confirmation)
    }

    pub fn allows_mutations(&self) -> bool {
        self.allow_mutations
    }

    pub fn requires_confirmation(&self) -> bool {
        self.require_confirmation
    }

    /// Check whether a call to `tool` may proceed.
    pub fn check(&self, tool: &str, mutating: bool, confirmed: bool) -> Result<(), GateError> {
        if !mutating {
            return Ok(());
        }
        if !self.allow_mutations {
            return Err(GateError::MutationsDisabled(tool.to_string()));
        }
        if self.require_confirmation && !confirmed {
            return Err(GateError::ConfirmationRequired(tool.to_string()));
        }
        Ok(())
    }
}

/// Remove the `confirm` flag from an argument map and report whether it was set.
///
/// Accepts JSON `true` or the string `"true"` (hosts that stringify arguments).
pub fn take_confirm(arguments: &mut Map<String, Value>) -> bool {
    match arguments.remove(CONFIRM_KEY) {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
