//! Requirement ingestion.
//!
//! A requirement arrives either as a bare label (`"Wear gloves"`) or as a record
//! (`{"value": "Check torque", "completed": true}`). Both are classified into a
//! [`RawRequirement`] once and normalized into one [`Requirement`] constructor, so
//! nothing downstream branches on the wire shape.

use serde_json::{Map, Value};

use crate::core::error::MalformedRequirementError;
use crate::core::procedure::Requirement;

const LABEL_KEYS: [&str; 2] = ["value", "label"];
const FOUND_PREVIEW_CHARS: usize = 80;

/// Wire shape of a single requirement entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRequirement<'a> {
    Label(&'a str),
    Record {
        label: &'a str,
        completed: bool,
        comment: Option<&'a str>,
    },
}

impl RawRequirement<'_> {
    pub fn into_requirement(self) -> Requirement {
        match self {
            RawRequirement::Label(label) => Requirement::new(label),
            RawRequirement::Record {
                label,
                completed,
                comment,
            } => Requirement::with_state(label, completed, comment.map(str::to_string)),
        }
    }
}

/// Classify a raw entry. Field names in records match case-insensitively.
///
/// Returns the reason the entry is malformed on failure.
pub fn classify(raw: &Value) -> Result<RawRequirement<'_>, String> {
    match raw {
        Value::String(label) => Ok(RawRequirement::Label(label)),
        Value::Object(fields) => classify_record(fields),
        Value::Null => Err("requirement is null".to_string()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) => Err(
            "expected a label string or a record with a value field".to_string(),
        ),
    }
}

fn classify_record(fields: &Map<String, Value>) -> Result<RawRequirement<'_>, String> {
    let label = LABEL_KEYS
        .iter()
        .find_map(|key| field(fields, key))
        .ok_or_else(|| "record has no value field".to_string())?;
    let label = label
        .as_str()
        .ok_or_else(|| "record value must be a string".to_string())?;

    let completed = match field(fields, "completed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err("record completed flag must be a boolean".to_string()),
    };

    let comment = match field(fields, "comment") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.as_str()),
        Some(_) => return Err("record comment must be a string".to_string()),
    };

    Ok(RawRequirement::Record {
        label,
        completed,
        comment,
    })
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Ingest one entry at (`step`, `entry`) into a [`Requirement`].
pub fn ingest_requirement(
    raw: &Value,
    step: usize,
    entry: usize,
) -> Result<Requirement, MalformedRequirementError> {
    classify(raw)
        .map(RawRequirement::into_requirement)
        .map_err(|reason| MalformedRequirementError {
            step,
            entry,
            reason,
            found: preview(raw),
        })
}

/// Ingest a step's whole `requirements` field, preserving order.
///
/// A bare string expands to a one-element list. Every malformed entry is
/// reported, not only the first.
pub fn ingest_requirements(
    raw: &Value,
    step: usize,
) -> Result<Vec<Requirement>, Vec<MalformedRequirementError>> {
    let entries = match raw {
        Value::String(_) => std::slice::from_ref(raw),
        Value::Array(items) => items.as_slice(),
        other => {
            return Err(vec![MalformedRequirementError {
                step,
                entry: 0,
                reason: "requirements must be a list or a single label".to_string(),
                found: preview(other),
            }]);
        }
    };

    let mut requirements = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();
    for (entry, item) in entries.iter().enumerate() {
        match ingest_requirement(item, step, entry) {
            Ok(req) => requirements.push(req),
            Err(err) => errors.push(err),
        }
    }
    if errors.is_empty() {
        Ok(requirements)
    } else {
        Err(errors)
    }
}

fn preview(raw: &Value) -> String {
    let rendered = raw.to_string();
    if rendered.chars().count() <= FOUND_PREVIEW_CHARS {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(FOUND_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_label_becomes_unchecked_requirement() {
        let req = ingest_requirement(&json!("Wear gloves"), 0, 0).expect("ingest");
        assert_eq!(req.label(), "Wear gloves");
        assert!(!req.completed);
        assert_eq!(req.comment, None);
    }

    #[test]
    fn record_populates_label_and_completed() {
        let req =
            ingest_requirement(&json!({"value": "Check torque", "completed": true}), 0, 0)
                .expect("ingest");
        assert_eq!(req.label(), "Check torque");
        assert!(req.completed);
    }

    #[test]
    fn record_without_completed_defaults_to_false() {
        let req = ingest_requirement(&json!({"Label": "Isolate supply"}), 0, 0).expect("ingest");
        assert_eq!(req.label(), "Isolate supply");
        assert!(!req.completed);
    }

    #[test]
    fn record_keys_match_case_insensitively() {
        let raw = json!({"VALUE": "Torque", "Completed": false, "Comment": "bolt seized"});
        let req = ingest_requirement(&raw, 0, 0).expect("ingest");
        assert_eq!(req.label(), "Torque");
        assert_eq!(req.comment.as_deref(), Some("bolt seized"));
    }

    #[test]
    fn number_is_malformed_with_position() {
        let err = ingest_requirement(&json!(42), 3, 7).expect_err("should fail");
        assert_eq!(err.step, 3);
        assert_eq!(err.entry, 7);
        assert_eq!(err.found, "42");
    }

    #[test]
    fn record_with_non_boolean_completed_is_malformed() {
        let err = ingest_requirement(&json!({"value": "x", "completed": "yes"}), 0, 0)
            .expect_err("should fail");
        assert!(err.reason.contains("boolean"));
    }

    #[test]
    fn record_without_value_is_malformed() {
        let err = ingest_requirement(&json!({"completed": true}), 0, 0).expect_err("should fail");
        assert!(err.reason.contains("no value field"));
    }

    #[test]
    fn list_ingestion_keeps_order_and_reports_every_bad_entry() {
        let raw = json!(["a", 1, {"value": "b"}, null]);
        let errors = ingest_requirements(&raw, 2).expect_err("should fail");
        let entries: Vec<usize> = errors.iter().map(|err| err.entry).collect();
        assert_eq!(entries, vec![1, 3]);

        let ok = ingest_requirements(&json!(["a", {"value": "b", "completed": true}]), 0)
            .expect("ingest");
        let labels: Vec<&str> = ok.iter().map(Requirement::label).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn single_label_expands_to_one_requirement() {
        let reqs = ingest_requirements(&json!("Only one"), 0).expect("ingest");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].label(), "Only one");
    }

    #[test]
    fn empty_list_is_not_an_error() {
        let reqs = ingest_requirements(&json!([]), 0).expect("ingest");
        assert!(reqs.is_empty());
    }

    #[test]
    fn long_entries_are_truncated_in_preview() {
        let raw = json!([{"value": 1, "padding": "x".repeat(200)}]);
        let errors = ingest_requirements(&raw, 0).expect_err("should fail");
        assert!(errors[0].found.ends_with("..."));
    }
}
