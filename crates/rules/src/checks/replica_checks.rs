//! Fixed replica bound check, independent of the configured range.

use confcheck_core::{Document, Issue, ValidationConfig};

use super::as_int;
use crate::registry::{RuleFailure, RuleRegistry};

const MIN_REPLICAS: i64 = 1;
const MAX_REPLICAS: i64 = 10;

pub fn register(registry: &mut RuleRegistry) {
    registry.register("replica", validate_replica);
}

pub fn validate_replica(doc: &Document, config: &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> {
    Ok(check_replicas_1_10(doc, config))
}

pub fn check_replicas_1_10(doc: &Document, _config: &ValidationConfig) -> Vec<Issue> {
    match as_int(doc.get("replicas")) {
        Some(r) if (MIN_REPLICAS..=MAX_REPLICAS).contains(&r) => Vec::new(),
        _ => vec![Issue::new(
            "replicas.range_1_10",
            format!("replicas must be an integer between {MIN_REPLICAS} and {MAX_REPLICAS}"),
            &["replicas", "range"],
        )],
    }
}
