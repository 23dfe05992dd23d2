//! End-of-procedure reconciliation sweep.
//!
//! Every requirement the operator left unchecked is confirmed one by one, in
//! (step, requirement) order. Edits made before an abort are kept.

use anyhow::Result;
use tracing::{debug, info};

use crate::core::procedure::{Procedure, Requirement, Step};
use crate::core::types::{Confirmation, ReviewOutcome};

/// Operator-facing side of the completion workflow.
pub trait Reviewer {
    /// Ask whether the finished test should be saved at all.
    fn confirm_save(&mut self) -> Result<bool>;

    /// Ask whether an unchecked requirement really is unmet.
    fn confirm_unmet(&mut self, step: &Step, requirement: &Requirement) -> Result<Confirmation>;

    /// Ask for a justification. `None` means the operator declined to write one.
    fn collect_comment(
        &mut self,
        step: &Step,
        requirement: &Requirement,
    ) -> Result<Option<String>>;
}

/// Reconcile every unchecked requirement with the operator.
pub fn review_procedure<R: Reviewer + ?Sized>(
    procedure: &mut Procedure,
    reviewer: &mut R,
) -> Result<ReviewOutcome> {
    for step_idx in 0..procedure.steps.len() {
        for req_idx in 0..procedure.steps[step_idx].requirements.len() {
            if procedure.steps[step_idx].requirements[req_idx].completed {
                continue;
            }
            let step = &procedure.steps[step_idx];
            let answer = reviewer.confirm_unmet(step, &step.requirements[req_idx])?;
            match answer {
                Confirmation::Met => {
                    procedure.steps[step_idx].requirements[req_idx].set_completed(true);
                    debug!(step = step_idx, requirement = req_idx, "confirmed met");
                }
                Confirmation::Unmet => {
                    if step.requirements[req_idx].comment.is_none() {
                        let comment = reviewer.collect_comment(step, &step.requirements[req_idx])?;
                        procedure.steps[step_idx].requirements[req_idx].comment = comment;
                    }
                    debug!(step = step_idx, requirement = req_idx, "confirmed unmet");
                }
                Confirmation::Abort => {
                    info!(step = step_idx, requirement = req_idx, "review aborted");
                    return Ok(ReviewOutcome::Aborted {
                        step: step_idx,
                        requirement: req_idx,
                    });
                }
            }
        }
    }
    Ok(ReviewOutcome::ReadyToPersist)
}
