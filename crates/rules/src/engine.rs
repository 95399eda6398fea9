//! Runs every registered rule against one document.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use confcheck_core::{Document, Issue, ValidationConfig};
use tracing::warn;

use crate::registry::{Rule, RuleRegistry};

/// Immutable, cheaply cloneable rule collection.
///
/// Shared read-only by all concurrent validations in a run.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<[Rule]>,
}

impl RuleEngine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            rules: registry.into_rules().into(),
        }
    }

    /// Engine over the built-in rules.
    pub fn builtin() -> Self {
        Self::new(RuleRegistry::builtin())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run all rules in order and collect their issues.
    ///
    /// A rule that returns an error or panics contributes one
    /// `<rule>.error` issue; the remaining rules still run.
    pub fn run(&self, doc: &Document, config: &ValidationConfig) -> Vec<Issue> {
        let mut issues = Vec::new();
        for rule in self.rules.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| rule.check(doc, config)));
            let failure = match result {
                Ok(Ok(found)) => {
                    issues.extend(found);
                    continue;
                }
                Ok(Err(failure)) => failure.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(rule = %rule.name(), error = %failure, "rule failed");
            issues.push(Issue::new(format!("{}.error", rule.name()), failure, &["error"]));
        }
        issues
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_string()
    }
}
