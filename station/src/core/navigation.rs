//! Linear step navigation over a loaded procedure.
//!
//! The presentation's checklist for the displayed step is the source of truth
//! for `completed`: every transition that leaves a step first writes the
//! checklist back into that step's requirements, by position.

use tracing::debug;

use crate::core::error::EngineError;
use crate::core::procedure::{Procedure, Step};
use crate::core::types::NavState;

/// Result of [`Navigator::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved to the given step.
    Moved(usize),
    /// Advance was requested from the last step; the completion workflow must run
    /// and then call [`Navigator::end_review`].
    TerminalReview,
}

/// Owns the loaded procedure and the cursor over its steps.
#[derive(Debug, Clone)]
pub struct Navigator {
    procedure: Option<Procedure>,
    state: NavState,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            procedure: None,
            state: NavState::NoProcedureLoaded,
        }
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any loaded procedure and reset the cursor to the first step.
    ///
    /// Returns the discarded procedure, unsaved edits included.
    pub fn load(&mut self, procedure: Procedure) -> Result<Option<Procedure>, EngineError> {
        if procedure.steps.is_empty() {
            return Err(EngineError::InvalidTransition(
                "cannot load a procedure without steps".to_string(),
            ));
        }
        let previous = self.procedure.replace(procedure);
        self.state = NavState::AtStep(0);
        debug!(discarded = previous.is_some(), "procedure loaded at step 0");
        Ok(previous)
    }

    pub fn discard(&mut self) -> Option<Procedure> {
        self.state = NavState::NoProcedureLoaded;
        self.procedure.take()
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.procedure.is_some()
    }

    pub fn procedure(&self) -> Option<&Procedure> {
        self.procedure.as_ref()
    }

    /// Mutable access for the completion workflow while the review runs.
    pub fn procedure_mut(&mut self) -> Option<&mut Procedure> {
        self.procedure.as_mut()
    }

    pub fn selected_step_index(&self) -> Option<usize> {
        match self.state {
            NavState::AtStep(idx) => Some(idx),
            NavState::AtTerminalReview => self.procedure.as_ref().map(|p| p.steps.len() - 1),
            NavState::NoProcedureLoaded => None,
        }
    }

    pub fn current_step(&self) -> Result<&Step, EngineError> {
        let idx = self.at_step()?;
        let procedure = self.loaded()?;
        procedure
            .steps
            .get(idx)
            .ok_or_else(|| out_of_bounds(idx, procedure.steps.len()))
    }

    /// Write the displayed checkbox state into the current step's requirements.
    pub fn commit(&mut self, checked: &[bool]) -> Result<(), EngineError> {
        let idx = self.at_step()?;
        let procedure = self
            .procedure
            .as_mut()
            .ok_or_else(|| not_loaded("commit"))?;
        let len = procedure.steps.len();
        let step = procedure
            .steps
            .get_mut(idx)
            .ok_or_else(|| out_of_bounds(idx, len))?;
        if checked.len() != step.requirements.len() {
            return Err(EngineError::InvalidTransition(format!(
                "checklist has {} entries but step {} has {} requirements",
                checked.len(),
                idx,
                step.requirements.len()
            )));
        }
        for (req, &is_checked) in step.requirements.iter_mut().zip(checked) {
            req.set_completed(is_checked);
        }
        Ok(())
    }

    /// Commit the displayed checklist, then move forward one step.
    pub fn advance(&mut self, checked: &[bool]) -> Result<Advance, EngineError> {
        let idx = self.at_step()?;
        self.commit(checked)?;
        let last = self.loaded()?.steps.len() - 1;
        if idx < last {
            self.state = NavState::AtStep(idx + 1);
            debug!(from = idx, to = idx + 1, "advanced");
            return Ok(Advance::Moved(idx + 1));
        }
        self.state = NavState::AtTerminalReview;
        debug!(step = idx, "advance past last step, entering review");
        Ok(Advance::TerminalReview)
    }

    /// Commit the displayed checklist, then move back one step.
    ///
    /// At the first step the cursor stays put.
    pub fn retreat(&mut self, checked: &[bool]) -> Result<usize, EngineError> {
        let idx = self.at_step()?;
        self.commit(checked)?;
        let next = idx.saturating_sub(1);
        self.state = NavState::AtStep(next);
        debug!(from = idx, to = next, "retreated");
        Ok(next)
    }

    /// Leave the terminal review.
    ///
    /// A closed review discards the procedure and returns it; otherwise the
    /// cursor goes back to the last step.
    pub fn end_review(&mut self, closed: bool) -> Result<Option<Procedure>, EngineError> {
        if self.state != NavState::AtTerminalReview {
            return Err(EngineError::InvalidTransition(
                "no review in progress".to_string(),
            ));
        }
        if closed {
            return Ok(self.discard());
        }
        let last = self.loaded()?.steps.len() - 1;
        self.state = NavState::AtStep(last);
        Ok(None)
    }

    fn loaded(&self) -> Result<&Procedure, EngineError> {
        self.procedure.as_ref().ok_or_else(|| not_loaded("navigate"))
    }

    fn at_step(&self) -> Result<usize, EngineError> {
        match self.state {
            NavState::AtStep(idx) => Ok(idx),
            NavState::NoProcedureLoaded => Err(not_loaded("navigate")),
            NavState::AtTerminalReview => Err(EngineError::InvalidTransition(
                "completion review in progress".to_string(),
            )),
        }
    }
}

fn not_loaded(action: &str) -> EngineError {
    EngineError::InvalidTransition(format!("cannot {action}: no procedure loaded"))
}

fn out_of_bounds(idx: usize, len: usize) -> EngineError {
    EngineError::InvalidTransition(format!("step index {idx} out of bounds ({len} steps)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{procedure, requirement, step};

    fn three_steps() -> Procedure {
        procedure(vec![
            step(1, vec![requirement("a", false), requirement("b", false)]),
            step(2, vec![requirement("c", false)]),
            step(3, vec![requirement("d", false)]),
        ])
    }

    #[test]
    fn load_resets_cursor_and_returns_previous() {
        let mut nav = Navigator::new();
        assert_eq!(nav.state(), NavState::NoProcedureLoaded);
        assert!(nav.load(three_steps()).expect("load").is_none());
        nav.advance(&[true, false]).expect("advance");
        assert_eq!(nav.state(), NavState::AtStep(1));

        let previous = nav.load(three_steps()).expect("reload").expect("previous");
        assert!(previous.steps[0].requirements[0].completed);
        assert_eq!(nav.state(), NavState::AtStep(0));
        assert!(!nav.procedure().expect("loaded").steps[0].requirements[0].completed);
    }

    #[test]
    fn advance_commits_then_moves() {
        let mut nav = Navigator::new();
        nav.load(three_steps()).expect("load");
        assert_eq!(nav.advance(&[true, false]).expect("advance"), Advance::Moved(1));
        let proc = nav.procedure().expect("loaded");
        assert_eq!(proc.steps[0].checklist(), vec![true, false]);
    }

    #[test]
    fn retreat_after_advance_preserves_completed() {
        let mut nav = Navigator::new();
        nav.load(three_steps()).expect("load");
        nav.advance(&[false, true]).expect("advance");
        let idx = nav.retreat(&[true]).expect("retreat");
        assert_eq!(idx, 0);
        assert_eq!(nav.current_step().expect("step").checklist(), vec![false, true]);
        assert!(nav.procedure().expect("loaded").steps[1].requirements[0].completed);
    }

    #[test]
    fn checking_a_requirement_clears_its_comment() {
        let mut nav = Navigator::new();
        let mut commented = requirement("a", false);
        commented.comment = Some("meter flat".to_string());
        let mut kept = requirement("b", false);
        kept.comment = Some("no access".to_string());
        nav.load(procedure(vec![step(1, vec![commented, kept])]))
            .expect("load");
        nav.commit(&[true, false]).expect("commit");
        let reqs = &nav.current_step().expect("step").requirements;
        assert_eq!(reqs[0].comment, None);
        assert_eq!(reqs[1].comment.as_deref(), Some("no access"));
    }

    #[test]
    fn retreat_at_first_step_stays() {
        let mut nav = Navigator::new();
        nav.load(three_steps()).expect("load");
        assert_eq!(nav.retreat(&[true, true]).expect("retreat"), 0);
        assert_eq!(nav.state(), NavState::AtStep(0));
        assert_eq!(nav.current_step().expect("step").checklist(), vec![true, true]);
    }

    #[test]
    fn advance_from_last_step_enters_review() {
        let mut nav = Navigator::new();
        nav.load(three_steps()).expect("load");
        nav.advance(&[false, false]).expect("1");
        nav.advance(&[false]).expect("2");
        assert_eq!(nav.advance(&[true]).expect("3"), Advance::TerminalReview);
        assert_eq!(nav.state(), NavState::AtTerminalReview);
        assert_eq!(nav.selected_step_index(), Some(2));
        assert!(nav.procedure().expect("loaded").steps[2].requirements[0].completed);

        let err = nav.advance(&[true]).expect_err("review in progress");
        assert!(matches!(err, EngineError::InvalidTransition(_)));

        assert!(nav.end_review(false).expect("end").is_none());
        assert_eq!(nav.state(), NavState::AtStep(2));
    }

    #[test]
    fn closed_review_discards_procedure() {
        let mut nav = Navigator::new();
        nav.load(procedure(vec![step(1, vec![requirement("a", true)])]))
            .expect("load");
        assert_eq!(nav.advance(&[true]).expect("advance"), Advance::TerminalReview);
        let closed = nav.end_review(true).expect("end").expect("procedure");
        assert_eq!(closed.steps.len(), 1);
        assert_eq!(nav.state(), NavState::NoProcedureLoaded);
        assert!(!nav.is_loaded());
    }

    #[test]
    fn navigation_without_procedure_is_invalid() {
        let mut nav = Navigator::new();
        assert!(matches!(
            nav.advance(&[]),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(matches!(
            nav.retreat(&[]),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(matches!(
            nav.end_review(false),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(nav.current_step().is_err());
    }

    #[test]
    fn checklist_length_mismatch_is_rejected_without_moving() {
        let mut nav = Navigator::new();
        nav.load(three_steps()).expect("load");
        let err = nav.advance(&[true]).expect_err("mismatch");
        assert!(err.to_string().contains("checklist has 1 entries"));
        assert_eq!(nav.state(), NavState::AtStep(0));
    }

    #[test]
    fn empty_step_accepts_empty_checklist() {
        let mut nav = Navigator::new();
        nav.load(procedure(vec![step(1, Vec::new()), step(2, Vec::new())]))
            .expect("load");
        assert_eq!(nav.advance(&[]).expect("advance"), Advance::Moved(1));
    }
}
