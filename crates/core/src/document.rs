//! Parsed documents, rule issues and per-file validation outcomes.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// A parsed configuration document: string keys to heterogeneous values.
pub type Document = Map<String, Value>;

// ── Parsing ───────────────────────────────────────────────────

/// Parse raw YAML bytes into a JSON value tree.
///
/// Empty and falsy documents become an empty mapping, and a sequence is
/// folded into one mapping (later keys win, non-mapping items are dropped).
pub fn parse_document(bytes: &[u8]) -> Result<Value, serde_yaml::Error> {
    let raw: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
    Ok(normalize(yaml_to_json(raw)))
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut merged = Document::new();
            for item in items {
                if let Value::Object(map) = item {
                    merged.extend(map);
                }
            }
            Value::Object(merged)
        }
        other if !is_truthy(&other) => Value::Object(Document::new()),
        other => other,
    }
}

/// Convert a YAML value into JSON, stringifying non-string mapping keys.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Falsy values: null, `false`, zero, empty string, empty sequence or mapping.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a scalar for use in keys and summaries (strings without quotes).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SHA-256 hex digest of the compact JSON encoding (keys sorted,
/// non-ASCII escaped as `\uXXXX`).
pub fn canonical_sha256(value: &Value) -> String {
    let payload = ascii_json(&serde_json::to_string(value).unwrap_or_default());
    let digest = Sha256::digest(payload.as_bytes());
    format!("{digest:x}")
}

/// Escape every non-ASCII character as UTF-16 `\uXXXX` units. Non-ASCII
/// only occurs inside string literals, so the result is the same JSON value.
fn ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

// ── Issue ─────────────────────────────────────────────────────

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub rule_id: String,
    pub message: String,
    pub keywords: Vec<String>,
    search_keys: BTreeSet<String>,
}

impl Issue {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            search_keys: BTreeSet::new(),
        }
    }

    /// Derived lookup keys; empty until [`Issue::with_search_keys`] runs.
    pub fn search_keys(&self) -> &BTreeSet<String> {
        &self.search_keys
    }

    /// Derive `rule:`, `keyword:`, `service:` and `registry:` keys.
    pub fn with_search_keys(mut self, data: Option<&Value>, registry: Option<&str>) -> Self {
        let mut keys = BTreeSet::new();
        keys.insert(format!("rule:{}", self.rule_id));
        for keyword in &self.keywords {
            keys.insert(format!("keyword:{keyword}"));
        }
        if let Some(service) = data
            .and_then(Value::as_object)
            .and_then(|doc| doc.get("service"))
            .filter(|v| is_truthy(v))
        {
            keys.insert(format!("service:{}", display_value(service)));
        }
        if let Some(registry) = registry.filter(|r| !r.is_empty()) {
            keys.insert(format!("registry:{registry}"));
        }
        self.search_keys = keys;
        self
    }
}

// ── Outcome ───────────────────────────────────────────────────

/// Result of validating one file in one pass.
///
/// `valid` is true exactly when there are no issues, and `errors` always
/// mirrors the issue messages in order. Both are derived at construction.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    path: String,
    valid: bool,
    errors: Vec<String>,
    issues: Vec<Issue>,
    registry: Option<String>,
    data: Option<Value>,
}

impl Outcome {
    /// Build an outcome, computing search keys for every issue.
    pub fn new(
        path: impl Into<String>,
        issues: Vec<Issue>,
        registry: Option<String>,
        data: Option<Value>,
    ) -> Self {
        let issues: Vec<Issue> = issues
            .into_iter()
            .map(|issue| issue.with_search_keys(data.as_ref(), registry.as_deref()))
            .collect();
        let errors = issues.iter().map(|i| i.message.clone()).collect();
        Self {
            path: path.into(),
            valid: issues.is_empty(),
            errors,
            issues,
            registry,
            data,
        }
    }

    /// A file that produced no usable document.
    pub fn failed(path: impl Into<String>, issue: Issue) -> Self {
        Self::new(path, vec![issue], None, None)
    }

    /// A validation abandoned after the per-file timeout.
    pub fn timed_out(path: impl Into<String>) -> Self {
        Self::failed(path, Issue::new("file.timeout", "TIMEOUT", &["timeout", "error"]))
    }

    /// A validation that failed outside the validator's own error handling.
    pub fn crashed(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::failed(path, Issue::new("file.error", cause, &["error"]))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The document as a mapping, if one was parsed.
    pub fn document(&self) -> Option<&Document> {
        self.data.as_ref().and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_of_mappings_merges_last_wins() {
        let doc = parse_document(b"- service: a\n  replicas: 1\n- replicas: 3\n- 42\n").unwrap();
        assert_eq!(doc, json!({"service": "a", "replicas": 3}));
    }

    #[test]
    fn empty_and_falsy_documents_become_empty_mapping() {
        for input in ["", "~", "false", "0", "[]", "''"] {
            assert_eq!(parse_document(input.as_bytes()).unwrap(), json!({}), "input {input:?}");
        }
    }

    #[test]
    fn scalar_document_is_kept() {
        assert_eq!(parse_document(b"hello").unwrap(), json!("hello"));
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let doc = parse_document(b"env:\n  1: one\n  true: yes\n").unwrap();
        assert_eq!(doc, json!({"env": {"1": "one", "true": "yes"}}));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(parse_document(b"service: [unclosed").is_err());
    }

    #[test]
    fn search_keys_include_service_and_registry() {
        let data = json!({"service": "user-api"});
        let issue = Issue::new("env.value_empty", "bad", &["env", "empty"])
            .with_search_keys(Some(&data), Some("myregistry.com"));
        let keys: Vec<_> = issue.search_keys().iter().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "keyword:empty",
                "keyword:env",
                "registry:myregistry.com",
                "rule:env.value_empty",
                "service:user-api",
            ]
        );
    }

    #[test]
    fn search_keys_skip_unknown_facts() {
        let issue = Issue::new("file.timeout", "TIMEOUT", &["timeout", "error"])
            .with_search_keys(None, None);
        assert_eq!(issue.search_keys().len(), 3);
        assert!(issue.search_keys().contains("rule:file.timeout"));
    }

    #[test]
    fn outcome_derives_validity_and_errors_from_issues() {
        let issues = vec![
            Issue::new("a.one", "first", &[]),
            Issue::new("b.two", "second", &[]),
        ];
        let outcome = Outcome::new("x.yaml", issues, None, Some(json!({})));
        assert!(!outcome.is_valid());
        assert_eq!(outcome.errors(), ["first", "second"]);
        assert!(outcome.issues().iter().all(|i| !i.search_keys().is_empty()));

        let clean = Outcome::new("y.yaml", Vec::new(), None, Some(json!({})));
        assert!(clean.is_valid());
        assert!(clean.errors().is_empty());
    }

    #[test]
    fn timeout_outcome_shape() {
        let outcome = Outcome::timed_out("slow.yaml");
        assert!(!outcome.is_valid());
        assert_eq!(outcome.errors(), ["TIMEOUT"]);
        assert_eq!(outcome.issues()[0].rule_id, "file.timeout");
        assert!(outcome.data().is_none());
    }

    #[test]
    fn canonical_hash_escapes_non_ascii() {
        let data = json!({"name": "caf\u{e9}", "emoji": "\u{1f600}"});
        let expected = Sha256::digest(br#"{"emoji":"\ud83d\ude00","name":"caf\u00e9"}"#);
        assert_eq!(canonical_sha256(&data), format!("{expected:x}"));
    }

    #[test]
    fn canonical_hash_ignores_key_order() {
        let a = parse_document(b"b: 1\na: 2\n").unwrap();
        let b = parse_document(b"a: 2\nb: 1\n").unwrap();
        assert_eq!(canonical_sha256(&a), canonical_sha256(&b));
        assert_eq!(canonical_sha256(&a).len(), 64);
    }
}
