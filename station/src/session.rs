//! Operator session over one station: target selection, step navigation and the
//! completion pass.
//!
//! The session owns the loaded procedure. Presentations drive it with the
//! checklist they display and a [`Reviewer`] for the completion prompts.

use tracing::{info, instrument, warn};

use crate::complete::{CompletionOutcome, PersistReport, RunContext, run_completion};
use crate::core::error::EngineError;
use crate::core::loader::load_procedure;
use crate::core::navigation::{Advance, Navigator};
use crate::core::procedure::{Procedure, Step};
use crate::core::review::Reviewer;
use crate::core::types::{NavState, OperatorId, ProcedureId, TargetId};
use crate::io::store::ProcedureStore;

/// Which target and procedure the loaded definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    pub target: TargetId,
    pub procedure: ProcedureId,
}

/// Result of [`Session::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Cursor moved to the given step.
    Moved(usize),
    /// Advance from the last step; the operator declined to save. Still at the last step.
    Declined,
    /// The review was aborted at the given position. Still at the last step.
    Aborted { step: usize, requirement: usize },
    /// Results were written and the procedure was closed.
    Saved {
        report: PersistReport,
        procedure: Procedure,
    },
}

pub struct Session<S: ProcedureStore> {
    store: S,
    operator: OperatorId,
    confirm_save: bool,
    navigator: Navigator,
    loaded: Option<Loaded>,
}

impl<S: ProcedureStore> Session<S> {
    pub fn new(store: S, operator: OperatorId) -> Self {
        Self {
            store,
            operator,
            confirm_save: true,
            navigator: Navigator::new(),
            loaded: None,
        }
    }

    /// Whether the completion pass asks "save the test?" first (default: yes).
    pub fn with_confirm_save(mut self, confirm_save: bool) -> Self {
        self.confirm_save = confirm_save;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the procedure currently assigned to `target`.
    ///
    /// Any previously loaded procedure is discarded with its unsaved edits. A
    /// failed selection leaves the previous procedure in place.
    #[instrument(skip_all, fields(target = %target))]
    pub fn select_target(&mut self, target: TargetId) -> Result<&Procedure, EngineError> {
        let procedure_id = self.store.latest_procedure_id(target)?.ok_or_else(|| {
            EngineError::ProcedureNotFound(format!("no procedure assigned to target {target}"))
        })?;
        let definition = self
            .store
            .procedure_definition(procedure_id)?
            .ok_or_else(|| {
                EngineError::ProcedureNotFound(format!(
                    "definition {procedure_id} for target {target} is missing"
                ))
            })?;
        let procedure = load_procedure(&definition)?;
        self.load(
            Loaded {
                target,
                procedure: procedure_id,
            },
            procedure,
        )
    }

    /// Load an already parsed procedure, discarding any previous one.
    pub fn load(
        &mut self,
        loaded: Loaded,
        procedure: Procedure,
    ) -> Result<&Procedure, EngineError> {
        if let Some(previous) = self.navigator.load(procedure)? {
            let unmet = previous.unmet().len();
            warn!(unmet, "discarded previously loaded procedure");
        }
        self.loaded = Some(loaded);
        info!(
            target_id = %loaded.target,
            procedure_id = %loaded.procedure,
            "procedure loaded"
        );
        self.navigator
            .procedure()
            .ok_or_else(|| EngineError::InvalidTransition("procedure vanished on load".to_string()))
    }

    /// Drop the loaded procedure without saving.
    pub fn discard(&mut self) -> Option<Procedure> {
        self.loaded = None;
        self.navigator.discard()
    }

    pub fn has_loaded(&self) -> bool {
        self.navigator.is_loaded()
    }

    pub fn loaded(&self) -> Option<Loaded> {
        self.loaded
    }

    pub fn state(&self) -> NavState {
        self.navigator.state()
    }

    pub fn procedure(&self) -> Option<&Procedure> {
        self.navigator.procedure()
    }

    pub fn selected_step_index(&self) -> Option<usize> {
        self.navigator.selected_step_index()
    }

    pub fn current_step(&self) -> Result<&Step, EngineError> {
        self.navigator.current_step()
    }

    /// Checklist the presentation should display for the current step.
    pub fn checklist(&self) -> Result<Vec<bool>, EngineError> {
        Ok(self.navigator.current_step()?.checklist())
    }

    pub fn retreat(&mut self, checked: &[bool]) -> Result<usize, EngineError> {
        self.navigator.retreat(checked)
    }

    /// Commit `checked` and move forward; from the last step run the completion pass.
    pub fn advance<R: Reviewer + ?Sized>(
        &mut self,
        checked: &[bool],
        reviewer: &mut R,
    ) -> Result<AdvanceOutcome, EngineError> {
        match self.navigator.advance(checked)? {
            Advance::Moved(idx) => Ok(AdvanceOutcome::Moved(idx)),
            Advance::TerminalReview => self.complete(reviewer),
        }
    }

    fn complete<R: Reviewer + ?Sized>(
        &mut self,
        reviewer: &mut R,
    ) -> Result<AdvanceOutcome, EngineError> {
        let result = self.run_review(reviewer);
        let saved = matches!(result, Ok(CompletionOutcome::Saved(_)));
        let closed = self.navigator.end_review(saved)?;
        match result? {
            CompletionOutcome::Declined => Ok(AdvanceOutcome::Declined),
            CompletionOutcome::Aborted { step, requirement } => {
                Ok(AdvanceOutcome::Aborted { step, requirement })
            }
            CompletionOutcome::Saved(report) => {
                self.loaded = None;
                let procedure = closed.ok_or_else(|| {
                    EngineError::InvalidTransition("saved procedure was not closed".to_string())
                })?;
                Ok(AdvanceOutcome::Saved { report, procedure })
            }
        }
    }

    fn run_review<R: Reviewer + ?Sized>(
        &mut self,
        reviewer: &mut R,
    ) -> Result<CompletionOutcome, EngineError> {
        let loaded = self
            .loaded
            .ok_or_else(|| EngineError::InvalidTransition("no target selected".to_string()))?;
        let context = RunContext {
            target: loaded.target,
            procedure: loaded.procedure,
            operator: self.operator,
        };
        let procedure = self
            .navigator
            .procedure_mut()
            .ok_or_else(|| EngineError::InvalidTransition("no procedure loaded".to_string()))?;
        run_completion(&self.store, context, procedure, reviewer, self.confirm_save)
    }
}
