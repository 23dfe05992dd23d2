//! Decode a procedure definition payload into a [`Procedure`].
//!
//! Definition field names match case-insensitively, so keys are lower-cased
//! before the payload is checked against the embedded v1 schema. Requirement
//! entries are left unconstrained by the schema and judged by ingestion instead.

use std::collections::HashSet;

use jsonschema::validator_for;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::error::EngineError;
use crate::core::procedure::{Procedure, Step};
use crate::core::requirement::ingest_requirements;

pub const PROCEDURE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/procedure/v1.schema.json"
));

#[derive(Debug, Deserialize)]
struct WireProcedure {
    steps: Vec<WireStep>,
    #[serde(default)]
    safety_requirements: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    step_id: i32,
    name: String,
    description: String,
    requirements: Value,
    #[serde(default)]
    equipment_needed: Option<Vec<String>>,
}

/// Parse, validate and ingest a raw definition.
pub fn load_procedure(raw: &str) -> Result<Procedure, EngineError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| EngineError::ProcedureParse(format!("invalid json: {err}")))?;
    load_procedure_value(value)
}

/// Same as [`load_procedure`] for an already-decoded payload.
pub fn load_procedure_value(value: Value) -> Result<Procedure, EngineError> {
    let value = normalize_keys(value)?;
    validate_schema(&value)?;
    let wire: WireProcedure = serde_json::from_value(value)
        .map_err(|err| EngineError::ProcedureParse(format!("decode definition: {err}")))?;
    validate_semantics(&wire)?;

    let mut steps = Vec::with_capacity(wire.steps.len());
    let mut malformed = Vec::new();
    for (idx, wire_step) in wire.steps.into_iter().enumerate() {
        let requirements = match ingest_requirements(&wire_step.requirements, idx) {
            Ok(reqs) => reqs,
            Err(errors) => {
                malformed.extend(errors);
                Vec::new()
            }
        };
        steps.push(Step {
            step_id: wire_step.step_id,
            name: wire_step.name,
            description: wire_step.description,
            requirements,
            equipment_needed: wire_step.equipment_needed,
        });
    }
    if !malformed.is_empty() {
        return Err(EngineError::MalformedRequirements(malformed));
    }

    for (idx, step) in steps.iter().enumerate() {
        if step.requirements.is_empty() {
            warn!(step = idx, step_id = step.step_id, "step has no requirements");
        }
    }

    let procedure = Procedure {
        steps,
        safety_requirements: wire.safety_requirements.unwrap_or_default(),
    };
    debug!(
        steps = procedure.steps.len(),
        requirements = procedure.requirement_count(),
        "procedure definition loaded"
    );
    Ok(procedure)
}

/// Lower-case every object key, recursively.
///
/// Two keys of one object that differ only by case are rejected.
fn normalize_keys(value: Value) -> Result<Value, EngineError> {
    match value {
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, inner) in fields {
                let lowered = key.to_lowercase();
                if out.contains_key(&lowered) {
                    return Err(EngineError::ProcedureParse(format!(
                        "field {key:?} is given more than once (keys are case-insensitive)"
                    )));
                }
                out.insert(lowered, normalize_keys(inner)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .into_iter()
            .map(normalize_keys)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn validate_schema(instance: &Value) -> Result<(), EngineError> {
    let schema: Value = serde_json::from_str(PROCEDURE_SCHEMA)
        .map_err(|err| EngineError::ProcedureParse(format!("parse schema: {err}")))?;
    let compiled = validator_for(&schema)
        .map_err(|err| EngineError::ProcedureParse(format!("invalid schema: {err}")))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(EngineError::ProcedureParse(format!(
            "schema validation failed: {}",
            messages.join("; ")
        )));
    }
    Ok(())
}

/// Checks the schema cannot express.
fn validate_semantics(wire: &WireProcedure) -> Result<(), EngineError> {
    if wire.steps.is_empty() {
        return Err(EngineError::ProcedureParse(
            "procedure has no steps".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for step in &wire.steps {
        if !seen.insert(step.step_id) {
            duplicates.push(step.step_id.to_string());
        }
    }
    if !duplicates.is_empty() {
        return Err(EngineError::ProcedureParse(format!(
            "duplicate step_id: {}",
            duplicates.join(", ")
        )));
    }
    Ok(())
}
