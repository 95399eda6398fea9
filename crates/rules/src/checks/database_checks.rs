//! Forbidden database name check.

use confcheck_core::{Document, Issue, ValidationConfig};
use serde_json::Value;

use crate::registry::{RuleFailure, RuleRegistry};

pub fn register(registry: &mut RuleRegistry) {
    registry.register("database", validate_database);
}

pub fn validate_database(doc: &Document, config: &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> {
    Ok(check_database_name(doc, config))
}

/// `env.DATABASE_URL` must not name the forbidden database.
pub fn check_database_name(doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
    let Some(Value::Object(env)) = doc.get("env") else {
        return Vec::new();
    };
    let forbidden = config.forbidden_database_name.as_str();
    let mut offending: Vec<&str> = env
        .iter()
        .filter(|(k, v)| {
            k.trim() == "DATABASE_URL" && v.as_str().map(|s| s.trim() == forbidden).unwrap_or(false)
        })
        .map(|(k, _)| k.as_str())
        .collect();
    if offending.is_empty() {
        return Vec::new();
    }
    offending.sort_unstable();
    vec![Issue::new(
        "database.forbidden_name",
        format!("Database name cannot be '{forbidden}': {offending:?}"),
        &["database", "forbidden"],
    )]
}
