//! Persistence boundary for procedure definitions and test results.
//!
//! The [`ProcedureStore`] trait is the only way the engine reaches storage.
//! [`FileStore`] keeps the same contract in JSON files under `.station/`; tests
//! use an in-memory store that records every call.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::loader::load_procedure;
use crate::core::types::{OperatorId, ProcedureId, RunId, TargetId};
use crate::io::atomic::{write_atomic, write_json_atomic};
use crate::io::init::StationPaths;

/// A unit that can be selected for testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub display_name: String,
    /// Procedures assigned over time; the last one is current.
    #[serde(default)]
    pub procedures: Vec<ProcedureId>,
}

/// One requirement outcome, as written by a single `save_result` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultRecord<'a> {
    pub target: TargetId,
    pub procedure: ProcedureId,
    pub operator: OperatorId,
    pub step_id: i32,
    pub requirement: &'a str,
    pub passed: bool,
    pub comment: Option<&'a str>,
}

/// Abstraction over the store holding definitions and results.
pub trait ProcedureStore {
    fn list_targets(&self) -> Result<Vec<Target>>;

    /// Procedure most recently assigned to `target`; `None` when there is none.
    fn latest_procedure_id(&self, target: TargetId) -> Result<Option<ProcedureId>>;

    /// Raw definition payload; `None` when the id is unknown.
    fn procedure_definition(&self, procedure: ProcedureId) -> Result<Option<String>>;

    /// Write one result. `run = None` opens a new run; the returned id must be
    /// passed back for every later result of the same completion pass.
    fn save_result(&self, record: &ResultRecord<'_>, run: Option<RunId>) -> Result<RunId>;
}

/// Persisted results of one completion pass (`.station/runs/<id>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub target: TargetId,
    pub procedure: ProcedureId,
    pub operator: OperatorId,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub step_id: i32,
    pub requirement: String,
    pub passed: bool,
    pub comment: Option<String>,
}

impl From<&ResultRecord<'_>> for ResultRow {
    fn from(record: &ResultRecord<'_>) -> Self {
        Self {
            step_id: record.step_id,
            requirement: record.requirement.to_string(),
            passed: record.passed,
            comment: record.comment.map(str::to_string),
        }
    }
}

/// Store backed by JSON files under `.station/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StationPaths,
}

impl FileStore {
    pub fn new(paths: StationPaths) -> Self {
        Self { paths }
    }

    pub fn load_run(&self, run: RunId) -> Result<RunRecord> {
        let path = self.paths.run_path(run.value());
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read run {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse run {}", path.display()))
    }

    /// Register a validated definition and assign it to `target`.
    ///
    /// The target is created with `display_name` (or a generated name) when it
    /// does not exist yet.
    #[instrument(skip_all, fields(target = %target))]
    pub fn import_procedure(
        &self,
        target: TargetId,
        display_name: Option<&str>,
        definition: &str,
    ) -> Result<ProcedureId> {
        load_procedure(definition).context("validate definition")?;
        let id = ProcedureId::new(next_id(&self.paths.procedures_dir)?);
        write_atomic(&self.paths.procedure_path(id.value()), definition)?;

        let mut targets = self.read_targets()?;
        match targets.iter_mut().find(|t| t.id == target) {
            Some(existing) => {
                if let Some(name) = display_name {
                    existing.display_name = name.to_string();
                }
                existing.procedures.push(id);
            }
            None => targets.push(Target {
                id: target,
                display_name: display_name
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Target {target}")),
                procedures: vec![id],
            }),
        }
        targets.sort_by_key(|t| t.id);
        write_json_atomic(&self.paths.targets_path, &targets)?;
        debug!(procedure = %id, "procedure imported");
        Ok(id)
    }

    fn read_targets(&self) -> Result<Vec<Target>> {
        let path = &self.paths.targets_path;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }
}

impl ProcedureStore for FileStore {
    fn list_targets(&self) -> Result<Vec<Target>> {
        self.read_targets()
    }

    #[instrument(skip_all, fields(target = %target))]
    fn latest_procedure_id(&self, target: TargetId) -> Result<Option<ProcedureId>> {
        let latest = self
            .read_targets()?
            .into_iter()
            .find(|t| t.id == target)
            .and_then(|t| t.procedures.last().copied());
        debug!(procedure = ?latest, "latest procedure lookup");
        Ok(latest)
    }

    #[instrument(skip_all, fields(procedure = %procedure))]
    fn procedure_definition(&self, procedure: ProcedureId) -> Result<Option<String>> {
        let path = self.paths.procedure_path(procedure.value());
        if !path.exists() {
            debug!("definition not found");
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read definition {}", path.display()))?;
        Ok(Some(contents))
    }

    #[instrument(skip_all, fields(step_id = record.step_id, run = ?run))]
    fn save_result(&self, record: &ResultRecord<'_>, run: Option<RunId>) -> Result<RunId> {
        let mut run_record = match run {
            Some(run_id) => {
                let existing = self
                    .load_run(run_id)
                    .with_context(|| format!("append to run {run_id}"))?;
                if existing.target != record.target || existing.procedure != record.procedure {
                    return Err(anyhow!(
                        "run {run_id} belongs to target {} procedure {}, not target {} procedure {}",
                        existing.target,
                        existing.procedure,
                        record.target,
                        record.procedure
                    ));
                }
                existing
            }
            None => RunRecord {
                run_id: RunId::new(next_id(&self.paths.runs_dir)?),
                target: record.target,
                procedure: record.procedure,
                operator: record.operator,
                results: Vec::new(),
            },
        };
        run_record.results.push(ResultRow::from(record));
        write_json_atomic(&self.paths.run_path(run_record.run_id.value()), &run_record)?;
        debug!(run = %run_record.run_id, rows = run_record.results.len(), "result saved");
        Ok(run_record.run_id)
    }
}

/// Next free numeric id among `<n>.json` files in `dir` (starting at 1).
fn next_id(dir: &Path) -> Result<i32> {
    if !dir.exists() {
        return Ok(1);
    }
    let mut max = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let name = entry.file_name();
        let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
            continue;
        };
        if let Ok(id) = stem.parse::<i32>() {
            max = max.max(id);
        }
    }
    Ok(max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::init::{InitOptions, init_station};

    const DEFINITION: &str = r#"{"steps":[{"step_id":1,"name":"a","description":"d","requirements":["r"]}]}"#;

    fn store() -> (tempfile::TempDir, FileStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_station(temp.path(), &InitOptions { force: false }).expect("init");
        (temp, FileStore::new(paths))
    }

    fn record(requirement: &str, passed: bool) -> ResultRecord<'_> {
        ResultRecord {
            target: TargetId::new(4),
            procedure: ProcedureId::new(1),
            operator: OperatorId::new(1),
            step_id: 1,
            requirement,
            passed,
            comment: None,
        }
    }

    #[test]
    fn import_assigns_latest_procedure() {
        let (_temp, store) = store();
        let first = store
            .import_procedure(TargetId::new(4), Some("SB-04"), DEFINITION)
            .expect("import");
        let second = store
            .import_procedure(TargetId::new(4), None, DEFINITION)
            .expect("import");
        assert_eq!(first, ProcedureId::new(1));
        assert_eq!(second, ProcedureId::new(2));

        let targets = store.list_targets().expect("targets");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].display_name, "SB-04");
        assert_eq!(
            store.latest_procedure_id(TargetId::new(4)).expect("lookup"),
            Some(second)
        );
        assert_eq!(
            store.procedure_definition(second).expect("definition").as_deref(),
            Some(DEFINITION)
        );
    }

    #[test]
    fn import_rejects_invalid_definition() {
        let (_temp, store) = store();
        let err = store
            .import_procedure(TargetId::new(1), None, r#"{"steps": 3}"#)
            .expect_err("invalid");
        assert!(format!("{err:#}").contains("validate definition"));
        assert!(store.list_targets().expect("targets").is_empty());
    }

    #[test]
    fn unknown_target_and_procedure_yield_none() {
        let (_temp, store) = store();
        assert_eq!(store.latest_procedure_id(TargetId::new(9)).expect("lookup"), None);
        assert_eq!(
            store.procedure_definition(ProcedureId::new(9)).expect("lookup"),
            None
        );
    }

    #[test]
    fn save_result_opens_run_then_appends() {
        let (_temp, store) = store();
        let run = store.save_result(&record("a", true), None).expect("first");
        let again = store.save_result(&record("b", false), Some(run)).expect("second");
        assert_eq!(run, again);

        let other = store.save_result(&record("c", true), None).expect("new run");
        assert_eq!(other, RunId::new(run.value() + 1));

        let loaded = store.load_run(run).expect("load");
        let labels: Vec<&str> = loaded.results.iter().map(|r| r.requirement.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(!loaded.results[1].passed);
    }

    #[test]
    fn save_result_into_missing_run_fails() {
        let (_temp, store) = store();
        let err = store
            .save_result(&record("a", true), Some(RunId::new(77)))
            .expect_err("missing run");
        assert!(format!("{err:#}").contains("append to run 77"));
    }
}
