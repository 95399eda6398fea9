//! Explicit rule registry: rule name → check function, in registration order.
//!
//! Rules are added by calling [`RuleRegistry::register`], either from the
//! built-in `checks::*::register` functions or by embedding applications
//! that bring their own checks.

use std::sync::Arc;

use confcheck_core::{Document, Issue, ValidationConfig};
use tracing::warn;

/// Failure reported by a rule function itself (as opposed to a rule violation).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RuleFailure(pub String);

impl From<String> for RuleFailure {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for RuleFailure {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Signature every rule implements. Rules only read the document and config.
pub type RuleFn =
    Arc<dyn Fn(&Document, &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> + Send + Sync>;

/// A named rule function.
#[derive(Clone)]
pub struct Rule {
    name: String,
    check: RuleFn,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Document, &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the rule against one document.
    pub fn check(&self, doc: &Document, config: &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> {
        (self.check)(doc, config)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Ordered collection of named rules.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in checks.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::checks::register_builtin(&mut registry);
        registry
    }

    /// Add a rule. Registering an existing name replaces it in place.
    pub fn register<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&Document, &ValidationConfig) -> Result<Vec<Issue>, RuleFailure> + Send + Sync + 'static,
    {
        let rule = Rule::new(name, check);
        if let Some(existing) = self.rules.iter_mut().find(|r| r.name == rule.name) {
            warn!(rule = %rule.name, "rule registered twice, replacing previous definition");
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

/// The ordered built-in rule collection.
pub fn load_rules() -> Vec<Rule> {
    RuleRegistry::builtin().into_rules()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_are_registered_in_order() {
        let registry = RuleRegistry::builtin();
        assert_eq!(registry.names(), vec!["core", "database", "env", "replica"]);
    }

    #[test]
    fn registering_same_name_replaces_in_place() {
        let mut registry = RuleRegistry::new();
        registry
            .register("a", |_, _| Ok(Vec::new()))
            .register("b", |_, _| Ok(Vec::new()))
            .register("a", |_, _| Err("replaced".into()));

        assert_eq!(registry.names(), vec!["a", "b"]);
        let rules = registry.into_rules();
        let err = rules[0]
            .check(&Document::new(), &ValidationConfig::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "replaced");
    }
}
