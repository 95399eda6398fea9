//! Env value check.

use confcheck_core::{Document, Issue, ValidationConfig};
use serde_json::Value;

use crate::registry::{RuleFailure, RuleRegistry};

pub fn register(registry: &mut RuleRegistry) {
    registry.register("env", validate_env);
}

pub fn validate_env(doc: &Document, config: &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> {
    Ok(check_env_values(doc, config))
}

/// Every env value must be a non-blank string.
pub fn check_env_values(doc: &Document, _config: &ValidationConfig) -> Vec<Issue> {
    let Some(Value::Object(env)) = doc.get("env") else {
        return Vec::new();
    };
    let mut blank: Vec<&str> = env
        .iter()
        .filter(|(_, v)| v.as_str().map(|s| s.trim().is_empty()).unwrap_or(true))
        .map(|(k, _)| k.as_str())
        .collect();
    if blank.is_empty() {
        return Vec::new();
    }
    blank.sort_unstable();
    vec![Issue::new(
        "env.value_empty",
        format!("env values must be non-empty strings: {blank:?}"),
        &["env", "empty"],
    )]
}
