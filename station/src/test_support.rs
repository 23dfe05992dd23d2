//! Test-only helpers for building procedures and scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::procedure::{Procedure, Requirement, Step};
use crate::core::review::Reviewer;
use crate::core::types::{Confirmation, ProcedureId, RunId, TargetId};
use crate::io::init::{InitOptions, StationPaths, init_station};
use crate::io::store::{FileStore, ProcedureStore, ResultRecord, ResultRow, Target};

/// Two steps, three requirements, mixing record and bare-string shapes.
pub const SAMPLE_DEFINITION: &str = r#"{
  "safety_requirements": ["Lock out upstream breaker"],
  "steps": [
    {
      "step_id": 10,
      "name": "Visual inspection",
      "description": "Inspect the enclosure",
      "requirements": [
        {"value": "Enclosure undamaged", "completed": false},
        "Labels legible"
      ],
      "equipment_needed": ["Torch"]
    },
    {
      "step_id": 20,
      "name": "Insulation test",
      "description": "Megger each phase",
      "requirements": "Insulation above 1 MOhm"
    }
  ]
}"#;

/// Create a requirement with explicit `completed` and no comment.
pub fn requirement(label: &str, completed: bool) -> Requirement {
    Requirement::with_state(label, completed, None)
}

/// Create a deterministic step with the given requirements.
pub fn step(step_id: i32, requirements: Vec<Requirement>) -> Step {
    Step {
        step_id,
        name: format!("step {step_id}"),
        description: format!("step {step_id} description"),
        requirements,
        equipment_needed: None,
    }
}

/// Create a procedure with no safety requirements.
pub fn procedure(steps: Vec<Step>) -> Procedure {
    Procedure {
        steps,
        safety_requirements: Vec::new(),
    }
}

/// Reviewer that replays queued answers and records every label it was asked about.
#[derive(Debug, Default)]
pub struct ScriptedReviewer {
    save: bool,
    confirmations: VecDeque<Confirmation>,
    comments: VecDeque<Option<String>>,
    asked: Vec<String>,
}

impl ScriptedReviewer {
    /// Reviewer that agrees to save, then replays `confirmations` and `comments` in order.
    pub fn new(confirmations: Vec<Confirmation>, comments: Vec<Option<String>>) -> Self {
        Self {
            save: true,
            confirmations: confirmations.into(),
            comments: comments.into(),
            asked: Vec::new(),
        }
    }

    /// Answer "no" to the save prompt.
    pub fn declining_save(mut self) -> Self {
        self.save = false;
        self
    }

    /// Labels passed to `confirm_unmet`, in call order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn assert_drained(&self) -> Result<()> {
        if !self.confirmations.is_empty() || !self.comments.is_empty() {
            return Err(anyhow!(
                "scripted reviewer has {} confirmation(s) and {} comment(s) left",
                self.confirmations.len(),
                self.comments.len()
            ));
        }
        Ok(())
    }
}

impl Reviewer for ScriptedReviewer {
    fn confirm_save(&mut self) -> Result<bool> {
        Ok(self.save)
    }

    fn confirm_unmet(&mut self, _step: &Step, requirement: &Requirement) -> Result<Confirmation> {
        self.asked.push(requirement.label().to_string());
        self.confirmations
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation for {:?}", requirement.label()))
    }

    fn collect_comment(
        &mut self,
        _step: &Step,
        requirement: &Requirement,
    ) -> Result<Option<String>> {
        self.comments
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected comment request for {:?}", requirement.label()))
    }
}

/// One recorded `save_result` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCall {
    pub row: ResultRow,
    pub run: Option<RunId>,
    pub returned: RunId,
}

/// In-memory store that records every successful `save_result` call.
#[derive(Debug)]
pub struct MemoryStore {
    targets: Vec<Target>,
    definitions: HashMap<ProcedureId, String>,
    fail_on_call: Option<usize>,
    next_run: Cell<i32>,
    attempts: Cell<usize>,
    calls: RefCell<Vec<SaveCall>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            definitions: HashMap::new(),
            fail_on_call: None,
            next_run: Cell::new(1),
            attempts: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Assign `definition` to `target` under `procedure` (appended as latest).
    pub fn with_procedure(
        mut self,
        target: TargetId,
        procedure: ProcedureId,
        definition: &str,
    ) -> Self {
        self.definitions.insert(procedure, definition.to_string());
        match self.targets.iter_mut().find(|t| t.id == target) {
            Some(existing) => existing.procedures.push(procedure),
            None => self.targets.push(Target {
                id: target,
                display_name: format!("Target {target}"),
                procedures: vec![procedure],
            }),
        }
        self
    }

    /// Assign a procedure id without storing a definition for it.
    pub fn with_dangling_procedure(mut self, target: TargetId, procedure: ProcedureId) -> Self {
        self.targets.push(Target {
            id: target,
            display_name: format!("Target {target}"),
            procedures: vec![procedure],
        });
        self
    }

    /// Fail the `call`-th `save_result` (1-based) with "store unavailable".
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Stop failing; later calls succeed.
    pub fn heal(&mut self) {
        self.fail_on_call = None;
    }

    /// Number of `save_result` calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }

    pub fn calls(&self) -> Vec<SaveCall> {
        self.calls.borrow().clone()
    }
}

impl ProcedureStore for MemoryStore {
    fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(self.targets.clone())
    }

    fn latest_procedure_id(&self, target: TargetId) -> Result<Option<ProcedureId>> {
        Ok(self
            .targets
            .iter()
            .find(|t| t.id == target)
            .and_then(|t| t.procedures.last().copied()))
    }

    fn procedure_definition(&self, procedure: ProcedureId) -> Result<Option<String>> {
        Ok(self.definitions.get(&procedure).cloned())
    }

    fn save_result(&self, record: &ResultRecord<'_>, run: Option<RunId>) -> Result<RunId> {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        if self.fail_on_call == Some(attempt) {
            return Err(anyhow!("store unavailable"));
        }
        let returned = match run {
            Some(run) => run,
            None => {
                let id = self.next_run.get();
                self.next_run.set(id + 1);
                RunId::new(id)
            }
        };
        self.calls.borrow_mut().push(SaveCall {
            row: ResultRow::from(record),
            run,
            returned,
        });
        Ok(returned)
    }
}

/// Temporary project root with `.station/` already initialised.
pub struct TestStation {
    temp: TempDir,
    paths: StationPaths,
}

impl TestStation {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = init_station(temp.path(), &InitOptions { force: false })?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &StationPaths {
        &self.paths
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.paths.clone())
    }

    /// Import `definition` for `target` and return its procedure id.
    pub fn import(&self, target: TargetId, definition: &str) -> Result<ProcedureId> {
        self.store().import_procedure(target, None, definition)
    }
}
