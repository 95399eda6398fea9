//! Rule thresholds and required fields, loaded once per run.
//!
//! The config is an immutable snapshot: it is shared behind an `Arc` by every
//! concurrent validation, and nothing mutates it after [`load_validation_config`]
//! returns.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};

/// Default `<registry>/<service>:<version>` pattern.
pub const DEFAULT_IMAGE_PATTERN: &str =
    r"^(?P<registry>[\w.-]+(?::\d+)?)/(?P<service>[\w.-]+):(?P<version>[\w.-]+)$";

const CUSTOM_RULE_TYPES: &[&str] = &["range", "pattern", "enum", "required"];

/// Required casing for keys under `env`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvKeyCase {
    #[default]
    #[serde(rename = "UPPERCASE")]
    Uppercase,
    #[serde(rename = "lowercase")]
    Lowercase,
}

/// Declarative rule descriptor. Checked for shape at load time, never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomRule {
    pub field: String,
    pub rule_type: String,
    #[serde(default)]
    pub min_value: Option<i64>,
    #[serde(default)]
    pub max_value: Option<i64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CustomRule {
    fn check_shape(&self, index: usize) -> Result<()> {
        let invalid = |msg: String| CoreError::InvalidConfig(format!("custom_rules[{index}]: {msg}"));

        if self.field.trim().is_empty() {
            return Err(invalid("field must not be empty".into()));
        }
        if !CUSTOM_RULE_TYPES.contains(&self.rule_type.as_str()) {
            return Err(invalid(format!(
                "unknown rule_type '{}', expected one of {:?}",
                self.rule_type, CUSTOM_RULE_TYPES
            )));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(invalid(format!("min_value {min} exceeds max_value {max}")));
            }
        }
        if let Some(pattern) = &self.pattern {
            Regex::new(pattern).map_err(|e| invalid(format!("pattern does not compile: {e}")))?;
        }
        Ok(())
    }
}

// ── On-disk form ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ValidationConfigFile {
    #[serde(default = "default_replicas_min")]
    replicas_min: i64,
    #[serde(default = "default_replicas_max")]
    replicas_max: i64,
    #[serde(default = "default_image_pattern")]
    image_pattern: String,
    #[serde(default = "default_required_fields")]
    required_fields: BTreeSet<String>,
    #[serde(default)]
    env_key_case: EnvKeyCase,
    #[serde(default)]
    custom_rules: Vec<CustomRule>,
    #[serde(default = "default_forbidden_database_name")]
    forbidden_database_name: String,
}

fn default_replicas_min() -> i64 {
    1
}

fn default_replicas_max() -> i64 {
    50
}

fn default_image_pattern() -> String {
    DEFAULT_IMAGE_PATTERN.to_string()
}

fn default_required_fields() -> BTreeSet<String> {
    ["service", "image", "replicas"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_forbidden_database_name() -> String {
    "test".to_string()
}

impl Default for ValidationConfigFile {
    fn default() -> Self {
        Self {
            replicas_min: default_replicas_min(),
            replicas_max: default_replicas_max(),
            image_pattern: default_image_pattern(),
            required_fields: default_required_fields(),
            env_key_case: EnvKeyCase::default(),
            custom_rules: Vec::new(),
            forbidden_database_name: default_forbidden_database_name(),
        }
    }
}

// ── ValidationConfig ──────────────────────────────────────────

/// Immutable snapshot of rule thresholds shared read-only across a run.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub replicas_min: i64,
    pub replicas_max: i64,
    pub required_fields: BTreeSet<String>,
    pub env_key_case: EnvKeyCase,
    pub custom_rules: Vec<CustomRule>,
    pub forbidden_database_name: String,
    image_pattern: String,
    image_regex: Regex,
}

impl ValidationConfig {
    fn from_file(file: ValidationConfigFile) -> Result<Self> {
        let image_regex = compile_image_pattern(&file.image_pattern)?;
        let config = Self {
            replicas_min: file.replicas_min,
            replicas_max: file.replicas_max,
            required_fields: file.required_fields,
            env_key_case: file.env_key_case,
            custom_rules: file.custom_rules,
            forbidden_database_name: file.forbidden_database_name,
            image_pattern: file.image_pattern,
            image_regex,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.replicas_min > self.replicas_max {
            return Err(CoreError::InvalidConfig(format!(
                "replicas_min ({}) exceeds replicas_max ({})",
                self.replicas_min, self.replicas_max
            )));
        }
        for (index, rule) in self.custom_rules.iter().enumerate() {
            rule.check_shape(index)?;
        }
        Ok(())
    }

    /// Apply command-line replica bounds on top of the loaded values.
    pub fn with_replica_bounds(mut self, min: Option<i64>, max: Option<i64>) -> Result<Self> {
        if let Some(min) = min {
            self.replicas_min = min;
        }
        if let Some(max) = max {
            self.replicas_max = max;
        }
        self.check()?;
        Ok(self)
    }

    /// Replace the image pattern. The pattern must contain a `registry` group.
    pub fn with_image_pattern(mut self, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        self.image_regex = compile_image_pattern(&pattern)?;
        self.image_pattern = pattern;
        Ok(self)
    }

    /// The pattern as written in the config file.
    pub fn image_pattern(&self) -> &str {
        &self.image_pattern
    }

    /// Compiled image pattern, anchored at the start of the input.
    pub fn image_regex(&self) -> &Regex {
        &self.image_regex
    }

    /// Registry part of an image reference, if it matches the image pattern.
    pub fn extract_registry(&self, image: &str) -> Option<String> {
        self.image_regex
            .captures(image)
            .and_then(|caps| caps.name("registry"))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            replicas_min: default_replicas_min(),
            replicas_max: default_replicas_max(),
            required_fields: default_required_fields(),
            env_key_case: EnvKeyCase::default(),
            custom_rules: Vec::new(),
            forbidden_database_name: default_forbidden_database_name(),
            image_pattern: default_image_pattern(),
            image_regex: compile_image_pattern(DEFAULT_IMAGE_PATTERN)
                .expect("default image pattern compiles"),
        }
    }
}

/// Compile a user pattern so that it only matches from the start of the input.
fn compile_image_pattern(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(&format!("^(?:{pattern})"))?;
    if !regex.capture_names().flatten().any(|name| name == "registry") {
        return Err(CoreError::InvalidConfig(format!(
            "image_pattern must define a named group 'registry': {pattern}"
        )));
    }
    Ok(regex)
}

/// Load the validation config from `path`, or return defaults when no path is given.
///
/// An empty file yields the defaults. A path that does not exist is an error.
pub fn load_validation_config(path: Option<&Path>) -> Result<ValidationConfig> {
    let Some(path) = path else {
        debug!("no validation config given, using defaults");
        return Ok(ValidationConfig::default());
    };
    if !path.exists() {
        return Err(CoreError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path)?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&contents)?;
    let file = if raw.is_null() {
        ValidationConfigFile::default()
    } else {
        serde_yaml::from_value(raw)?
    };

    let config = ValidationConfig::from_file(file)?;
    info!(
        path = %path.display(),
        replicas_min = config.replicas_min,
        replicas_max = config.replicas_max,
        custom_rules = config.custom_rules.len(),
        "loaded validation config"
    );
    Ok(config)
}
