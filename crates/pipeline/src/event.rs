//! Event-log records and report entries derived from outcomes.

use std::collections::BTreeSet;

use chrono::Utc;
use confcheck_core::{canonical_sha256, display_value, is_truthy, Issue, Outcome};
use serde::Serialize;

/// Issues considered when collecting rule ids and keywords.
const SUMMARY_ISSUE_LIMIT: usize = 8;
/// Maximum entries in `rule_ids` and `keywords`.
const SET_LIMIT: usize = 8;
/// Keywords taken from each considered issue.
const KEYWORDS_PER_ISSUE: usize = 4;
/// Maximum length, in characters, of `sample_error`.
const SAMPLE_ERROR_CHARS: usize = 200;

/// Identifier and timestamp shared by every record written in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    pub run_id: String,
    pub ts: String,
}

impl RunStamp {
    /// Current UTC time at second precision, e.g. `2024-05-01T12:00:00Z`.
    pub fn now() -> Self {
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        Self {
            run_id: ts.clone(),
            ts,
        }
    }
}

/// Compact per-file summary. This is one entry of a persisted report and
/// the body of one event-log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub registry: String,
    pub service: String,
    pub valid: bool,
    pub error_count: usize,
    pub rule_ids: Vec<String>,
    pub keywords: Vec<String>,
    pub sample_error: String,
    pub sha256: String,
}

impl FileSummary {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let considered = &outcome.issues()[..outcome.issues().len().min(SUMMARY_ISSUE_LIMIT)];

        let rule_ids: BTreeSet<&str> = considered
            .iter()
            .map(|i| i.rule_id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        let keywords: BTreeSet<&str> = considered
            .iter()
            .flat_map(|i| i.keywords.iter().take(KEYWORDS_PER_ISSUE).map(String::as_str))
            .collect();

        let sample_error = outcome
            .errors()
            .first()
            .map(|e| e.chars().take(SAMPLE_ERROR_CHARS).collect())
            .unwrap_or_default();

        let sha256 = outcome
            .data()
            .filter(|d| is_truthy(d))
            .map(canonical_sha256)
            .unwrap_or_default();

        Self {
            path: outcome.path().to_string(),
            registry: outcome.registry().unwrap_or_default().to_string(),
            service: service_name(outcome),
            valid: outcome.is_valid(),
            // Errors mirror issues one-to-one, so a failing file counts each twice.
            error_count: outcome.errors().len() + outcome.issues().len(),
            rule_ids: capped(rule_ids),
            keywords: capped(keywords),
            sample_error,
            sha256,
        }
    }
}

/// First entries of a sorted set.
fn capped(set: BTreeSet<&str>) -> Vec<String> {
    set.into_iter().take(SET_LIMIT).map(String::from).collect()
}

/// `data.service`, falling back to `data.name`, else empty.
fn service_name(outcome: &Outcome) -> String {
    let Some(doc) = outcome.document() else {
        return String::new();
    };
    ["service", "name"]
        .iter()
        .filter_map(|key| doc.get(*key))
        .find(|v| is_truthy(v))
        .map(display_value)
        .unwrap_or_default()
}

/// One line of the event log.
///
/// Carries the outcome's errors and issues but not its parsed document;
/// `sha256` identifies the document instead.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub ts: String,
    pub run_id: String,
    #[serde(flatten)]
    pub summary: FileSummary,
    pub errors: Vec<String>,
    pub issues: Vec<Issue>,
}

impl Event {
    pub fn from_outcome(outcome: &Outcome, stamp: &RunStamp) -> Self {
        Self {
            kind: "file",
            ts: stamp.ts.clone(),
            run_id: stamp.run_id.clone(),
            summary: FileSummary::from_outcome(outcome),
            errors: outcome.errors().to_vec(),
            issues: outcome.issues().to_vec(),
        }
    }

    pub fn path(&self) -> &str {
        &self.summary.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn issue(id: &str, keywords: &[&str]) -> Issue {
        Issue::new(id, format!("{id} failed"), keywords)
    }

    #[test]
    fn summary_of_valid_file() {
        let data = json!({"service": "user-api", "replicas": 3});
        let outcome = Outcome::new("svc.yaml", Vec::new(), Some("myregistry.com".into()), Some(data.clone()));
        let summary = FileSummary::from_outcome(&outcome);

        assert!(summary.valid);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.service, "user-api");
        assert_eq!(summary.registry, "myregistry.com");
        assert_eq!(summary.sample_error, "");
        assert_eq!(summary.sha256, canonical_sha256(&data));
    }

    #[test]
    fn error_count_counts_errors_and_issues() {
        let outcome = Outcome::new(
            "svc.yaml",
            vec![issue("a.x", &["a"]), issue("b.y", &["b"])],
            None,
            Some(json!({"name": "fallback"})),
        );
        let summary = FileSummary::from_outcome(&outcome);
        assert_eq!(summary.error_count, 4);
        assert_eq!(summary.service, "fallback");
        assert_eq!(summary.sample_error, "a.x failed");
    }

    #[test]
    fn rule_ids_and_keywords_are_sorted_and_capped() {
        let mut issues: Vec<Issue> = (0..10)
            .rev()
            .map(|n| {
                let (a, b) = (format!("k{n}a"), format!("k{n}b"));
                issue(&format!("rule.{n}"), &[a.as_str(), b.as_str(), "shared", "x", "dropped"])
            })
            .collect();
        issues.insert(0, issue("rule.9", &["shared"]));
        let outcome = Outcome::new("svc.yaml", issues, None, None);
        let summary = FileSummary::from_outcome(&outcome);

        // The first 8 issues cover rule.9 (twice) down to rule.3.
        assert_eq!(
            summary.rule_ids,
            ["rule.3", "rule.4", "rule.5", "rule.6", "rule.7", "rule.8", "rule.9"]
        );
        assert_eq!(summary.keywords.len(), 8);
        assert_eq!(&summary.keywords[..3], ["k3a", "k3b", "k4a"]);
        assert!(!summary.keywords.iter().any(|k| k == "dropped"));
    }

    #[test]
    fn sample_error_is_truncated_by_characters() {
        let long = "é".repeat(300);
        let outcome = Outcome::failed("svc.yaml", Issue::new("file.error", long, &["error"]));
        let summary = FileSummary::from_outcome(&outcome);
        assert_eq!(summary.sample_error.chars().count(), 200);
    }

    #[test]
    fn missing_or_empty_data_has_no_hash() {
        let timed_out = FileSummary::from_outcome(&Outcome::timed_out("slow.yaml"));
        assert_eq!(timed_out.sha256, "");
        assert_eq!(timed_out.service, "");

        let empty = Outcome::new("empty.yaml", Vec::new(), None, Some(json!({})));
        assert_eq!(FileSummary::from_outcome(&empty).sha256, "");
    }

    #[test]
    fn event_serializes_flat() {
        let stamp = RunStamp {
            run_id: "2024-05-01T12:00:00Z".into(),
            ts: "2024-05-01T12:00:00Z".into(),
        };
        let outcome = Outcome::timed_out("slow.yaml");
        let value: Value = serde_json::to_value(Event::from_outcome(&outcome, &stamp)).unwrap();

        assert_eq!(value["type"], "file");
        assert_eq!(value["path"], "slow.yaml");
        assert_eq!(value["run_id"], "2024-05-01T12:00:00Z");
        assert_eq!(value["errors"], json!(["TIMEOUT"]));
        assert_eq!(value["issues"][0]["rule_id"], "file.timeout");
        assert_eq!(value["error_count"], 2);
    }

    #[test]
    fn run_stamp_is_second_precision_utc() {
        let stamp = RunStamp::now();
        assert_eq!(stamp.ts.len(), "2024-05-01T12:00:00Z".len());
        assert!(stamp.ts.ends_with('Z'));
        assert_eq!(stamp.run_id, stamp.ts);
    }
}
