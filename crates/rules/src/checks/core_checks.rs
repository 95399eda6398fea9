//! Core manifest checks: required keys, replicas, image, env key case, service name.

use confcheck_core::{Document, EnvKeyCase, Issue, ValidationConfig};
use serde_json::Value;

use super::{as_int, is_lower, is_upper};
use crate::registry::{RuleFailure, RuleRegistry};

pub fn register(registry: &mut RuleRegistry) {
    registry.register("core", validate_core);
}

/// Run all core checks in order.
pub fn validate_core(doc: &Document, config: &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> {
    let mut issues = Vec::new();
    issues.extend(check_required_fields(doc, config));
    issues.extend(check_replicas_range(doc, config));
    issues.extend(check_image_format(doc, config));
    issues.extend(check_env_key_case(doc, config));
    issues.extend(check_service_name(doc, config));
    Ok(issues)
}

pub fn check_required_fields(doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
    let missing: Vec<&str> = config
        .required_fields
        .iter()
        .filter(|field| !doc.contains_key(field.as_str()))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return Vec::new();
    }
    vec![Issue::new(
        "schema.required_keys",
        format!("Missing required keys: {missing:?}"),
        &["schema", "required"],
    )]
}

pub fn check_replicas_range(doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
    let in_range = as_int(doc.get("replicas"))
        .map(|r| (config.replicas_min..=config.replicas_max).contains(&r))
        .unwrap_or(false);
    if in_range {
        return Vec::new();
    }
    vec![Issue::new(
        "replicas.range",
        format!(
            "replicas must be an integer between {} and {}",
            config.replicas_min, config.replicas_max
        ),
        &["replicas", "range"],
    )]
}

pub fn check_image_format(doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
    let message = match doc.get("image") {
        Some(Value::String(image)) if config.image_regex().is_match(image) => return Vec::new(),
        Some(Value::String(_)) => "image must match <registry>/<service>:<version>",
        _ => "image must be a string like registry/service:version",
    };
    vec![Issue::new("image.format", message, &["image", "format"])]
}

pub fn check_env_key_case(doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
    let Some(Value::Object(env)) = doc.get("env") else {
        return Vec::new();
    };
    let (predicate, label): (fn(&str) -> bool, &str) = match config.env_key_case {
        EnvKeyCase::Uppercase => (is_upper, "UPPERCASE"),
        EnvKeyCase::Lowercase => (is_lower, "lowercase"),
    };
    let mut offending: Vec<&str> = env
        .keys()
        .map(String::as_str)
        .filter(|k| !predicate(*k))
        .collect();
    if offending.is_empty() {
        return Vec::new();
    }
    offending.sort_unstable();
    vec![Issue::new(
        "env.key_case",
        format!("env keys must be {label}: {offending:?}"),
        &["env", "case"],
    )]
}

pub fn check_service_name(doc: &Document, _config: &ValidationConfig) -> Vec<Issue> {
    match doc.get("service") {
        Some(Value::String(name)) if !name.trim().is_empty() => Vec::new(),
        _ => vec![Issue::new(
            "service.name_empty",
            "service name must be a non-empty string",
            &["service", "name", "empty"],
        )],
    }
}
