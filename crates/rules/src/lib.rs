//! Rule registry and engine for configuration documents.
//!
//! This crate provides:
//! - An explicit [`RuleRegistry`] mapping rule names to check functions
//! - The [`RuleEngine`], which runs every registered rule against one document
//!   and isolates rule failures into synthetic issues
//! - The built-in checks (required keys, replicas, image format, env)

pub mod checks;
pub mod engine;
pub mod registry;

pub use engine::RuleEngine;
pub use registry::{load_rules, Rule, RuleFailure, RuleFn, RuleRegistry};
