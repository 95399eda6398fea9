//! Integration tests that run the built-in rule set against whole
//! manifests, the way the validator does.

use confcheck_core::{parse_document, Document, Issue, ValidationConfig};
use confcheck_rules::{load_rules, RuleEngine, RuleRegistry};

fn doc(yaml: &str) -> Document {
    parse_document(yaml.as_bytes())
        .unwrap_or_else(|e| panic!("Failed to parse fixture: {e}"))
        .as_object()
        .cloned()
        .expect("fixture must be a mapping")
}

fn rule_ids(issues: &[Issue]) -> Vec<&str> {
    issues.iter().map(|i| i.rule_id.as_str()).collect()
}

fn bounded(min: i64, max: i64) -> ValidationConfig {
    ValidationConfig::default()
        .with_replica_bounds(Some(min), Some(max))
        .unwrap()
}

// ── Registration ────────────────────────────────────────────

#[test]
fn builtin_rules_load_in_order() {
    let names: Vec<String> = load_rules().iter().map(|r| r.name().to_string()).collect();
    assert_eq!(names, ["core", "database", "env", "replica"]);
    assert_eq!(RuleRegistry::builtin().names(), ["core", "database", "env", "replica"]);
}

// ── Well-formed manifests ───────────────────────────────────

#[test]
fn well_formed_manifest_passes_every_rule() {
    let manifest = doc(
        "service: user-api\n\
         replicas: 3\n\
         image: myregistry.com/user-api:1.4.2\n\
         env:\n  DATABASE_URL: postgres://db/users\n  LOG_LEVEL: info\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &ValidationConfig::default());
    assert!(issues.is_empty(), "unexpected issues: {:?}", rule_ids(&issues));
}

#[test]
fn list_of_mappings_is_validated_as_one_document() {
    let manifest = doc(
        "- service: user-api\n  replicas: 3\n\
         - image: myregistry.com/user-api:1.4.2\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &ValidationConfig::default());
    assert!(issues.is_empty(), "unexpected issues: {:?}", rule_ids(&issues));
}

// ── Single violations ───────────────────────────────────────

#[test]
fn empty_env_value_is_the_only_issue() {
    let manifest = doc(
        "service: api-3\n\
         replicas: 2\n\
         image: registry.com/api-3:v3.0\n\
         env:\n  KEY3: \"\"\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &bounded(1, 10));
    assert_eq!(rule_ids(&issues), ["env.value_empty"]);
    assert_eq!(issues[0].keywords, ["env", "empty"]);
}

#[test]
fn missing_image_is_one_format_issue_plus_required_keys() {
    let manifest = doc("service: api\nreplicas: 2\n");
    let issues = RuleEngine::builtin().run(&manifest, &ValidationConfig::default());
    assert_eq!(rule_ids(&issues), ["schema.required_keys", "image.format"]);
    assert_eq!(issues.iter().filter(|i| i.rule_id == "image.format").count(), 1);
}

#[test]
fn forbidden_database_is_reported() {
    let manifest = doc(
        "service: api\n\
         replicas: 2\n\
         image: registry.com/api:v1\n\
         env:\n  DATABASE_URL: test\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &ValidationConfig::default());
    assert_eq!(rule_ids(&issues), ["database.forbidden_name"]);
}

// ── Combined violations ─────────────────────────────────────

#[test]
fn replicas_outside_both_ranges() {
    let manifest = doc(
        "service: api\n\
         replicas: 20\n\
         image: registry.com/api:v1\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &bounded(1, 10));
    assert_eq!(rule_ids(&issues), ["replicas.range", "replicas.range_1_10"]);
}

#[test]
fn lowercase_env_keys_and_blank_service() {
    let manifest = doc(
        "service: \"  \"\n\
         replicas: 2\n\
         image: registry.com/api:v1\n\
         env:\n  debug: \"1\"\n",
    );
    let issues = RuleEngine::builtin().run(&manifest, &ValidationConfig::default());
    assert_eq!(rule_ids(&issues), ["env.key_case", "service.name_empty"]);
}
