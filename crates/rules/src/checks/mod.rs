//! Built-in document checks.
//!
//! Each submodule exposes plain check functions plus a `register` function
//! that adds its rule to a [`RuleRegistry`]. Registration order is the order
//! rules run in.

pub mod core_checks;
pub mod database_checks;
pub mod env_checks;
pub mod replica_checks;

use serde_json::Value;

use crate::registry::RuleRegistry;

/// Register every built-in rule: `core`, `database`, `env`, `replica`.
pub fn register_builtin(registry: &mut RuleRegistry) {
    core_checks::register(registry);
    database_checks::register(registry);
    env_checks::register(registry);
    replica_checks::register(registry);
}

/// Cased characters present and none of them lowercase.
pub(crate) fn is_upper(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

/// Cased characters present and none of them uppercase.
pub(crate) fn is_lower(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            return false;
        }
        cased |= c.is_lowercase();
    }
    cased
}

/// Integer value, rejecting floats and booleans.
pub(crate) fn as_int(value: Option<&Value>) -> Option<i64> {
    value.and_then(Value::as_i64)
}
