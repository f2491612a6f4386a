//! Colon-form alias derivation for tool names.
//!
//! Service modules name tools `prefix_service_action`. Hosts that follow the
//! namespaced naming guideline call them as `prefix:service:action`, with the
//! action's underscores written as hyphens:
//!
//! | Canonical name | Alias |
//! |----------------|-------|
//! | `skyhook_compute_list_instances` | `skyhook:compute:list-instances` |
//! | `skyhook_db_get` | `skyhook:db:get` |
//! | `skyhook:server:info` | *(none, already colon-form)* |
//! | `skyhook_ping` | *(none, no service/action split)* |

/// Derive the colon-form alias for `name`, or `None` if the name is not aliasable.
///
/// Only the first underscore after the prefix separates service from action.
pub fn derive_alias(name: &str, prefix: &str) -> Option<String> {
    if name.contains(':') {
        return None;
    }

    let remainder = name.strip_prefix(prefix)?.strip_prefix('_')?;
    let (service, action) = remainder.split_once('_')?;
    if service.is_empty() || action.is_empty() {
        return None;
    }

    Some(format!("{}:{}:{}", prefix, service, action.replace('_', "-")))
}
