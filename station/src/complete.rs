//! Orchestration for the end-of-procedure completion pass.
//!
//! Runs the reconciliation review and, when it finishes, writes one result per
//! requirement through the store. Writes are strictly sequential in (step,
//! requirement) order: the first call opens a run and every later call carries
//! that run id forward. A failed write stops the pass; rows already written are
//! left to the store and a retry starts a fresh run.

use tracing::{info, warn};

use crate::core::error::EngineError;
use crate::core::procedure::Procedure;
use crate::core::review::{Reviewer, review_procedure};
use crate::core::types::{OperatorId, ProcedureId, ReviewOutcome, RunId, TargetId};
use crate::io::store::{ProcedureStore, ResultRecord};

/// Identity written alongside every result of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub target: TargetId,
    pub procedure: ProcedureId,
    pub operator: OperatorId,
}

/// Rows written by a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    /// `None` only when the procedure has no requirements at all.
    pub run: Option<RunId>,
    pub saved: usize,
}

/// How a completion pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The operator chose not to save the test.
    Declined,
    /// The operator aborted the review at the given position; nothing was written.
    Aborted { step: usize, requirement: usize },
    /// Every result was written.
    Saved(PersistReport),
}

/// Run the completion pass over `procedure`.
pub fn run_completion<S, R>(
    store: &S,
    context: RunContext,
    procedure: &mut Procedure,
    reviewer: &mut R,
    confirm_save: bool,
) -> Result<CompletionOutcome, EngineError>
where
    S: ProcedureStore + ?Sized,
    R: Reviewer + ?Sized,
{
    if confirm_save && !reviewer.confirm_save()? {
        info!("operator declined to save the test");
        return Ok(CompletionOutcome::Declined);
    }

    match review_procedure(procedure, reviewer)? {
        ReviewOutcome::Aborted { step, requirement } => {
            Ok(CompletionOutcome::Aborted { step, requirement })
        }
        ReviewOutcome::ReadyToPersist => {
            let report = persist_results(store, context, procedure)?;
            Ok(CompletionOutcome::Saved(report))
        }
    }
}

/// Write every requirement outcome, carrying the run id forward.
pub fn persist_results<S: ProcedureStore + ?Sized>(
    store: &S,
    context: RunContext,
    procedure: &Procedure,
) -> Result<PersistReport, EngineError> {
    let total = procedure.requirement_count();
    let mut run: Option<RunId> = None;
    let mut saved = 0usize;

    for step in &procedure.steps {
        for requirement in &step.requirements {
            let record = ResultRecord {
                target: context.target,
                procedure: context.procedure,
                operator: context.operator,
                step_id: step.step_id,
                requirement: requirement.label(),
                passed: requirement.completed,
                comment: requirement
                    .comment
                    .as_deref()
                    .filter(|_| !requirement.completed),
            };
            let returned = match store.save_result(&record, run) {
                Ok(id) => id,
                Err(err) => {
                    warn!(saved, total, run = ?run, error = %format!("{err:#}"), "result write failed");
                    return Err(EngineError::PersistencePartialFailure {
                        saved,
                        total,
                        run,
                        reason: format!("{err:#}"),
                    });
                }
            };
            saved += 1;
            if let Some(expected) = run
                && expected != returned
            {
                return Err(EngineError::PersistencePartialFailure {
                    saved,
                    total,
                    run,
                    reason: format!("store switched from run {expected} to run {returned}"),
                });
            }
            run = Some(returned);
        }
    }

    info!(run = ?run, saved, "test results saved");
    Ok(PersistReport { run, saved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Confirmation;
    use crate::test_support::{MemoryStore, ScriptedReviewer, procedure, requirement, step};

    fn context() -> RunContext {
        RunContext {
            target: TargetId::new(3),
            procedure: ProcedureId::new(8),
            operator: OperatorId::new(1),
        }
    }

    /// 2 steps, 3 requirements.
    fn sample() -> Procedure {
        procedure(vec![
            step(
                10,
                vec![requirement("Wear gloves", true), requirement("Isolate", false)],
            ),
            step(20, vec![requirement("Megger", true)]),
        ])
    }

    #[test]
    fn full_pass_reuses_first_run_id() {
        let store = MemoryStore::new();
        let report = persist_results(&store, context(), &sample()).expect("persist");
        assert_eq!(report.saved, 3);

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].run, None);
        let first = report.run.expect("run id");
        assert!(calls[1..].iter().all(|call| call.run == Some(first)));
        let order: Vec<(i32, &str)> = calls
            .iter()
            .map(|call| (call.row.step_id, call.row.requirement.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(10, "Wear gloves"), (10, "Isolate"), (20, "Megger")]
        );
        assert!(!calls[1].row.passed);
    }

    #[test]
    fn passed_rows_are_written_without_comment() {
        let mut proc = sample();
        proc.steps[0].requirements[0].comment = Some("stale note".to_string());
        proc.steps[0].requirements[1].comment = Some("no key".to_string());
        let store = MemoryStore::new();
        persist_results(&store, context(), &proc).expect("persist");
        let comments: Vec<Option<String>> =
            store.calls().into_iter().map(|call| call.row.comment).collect();
        assert_eq!(comments, vec![None, Some("no key".to_string()), None]);
    }

    #[test]
    fn second_write_failure_reports_one_saved_and_stops() {
        let store = MemoryStore::new().failing_on_call(2);
        let err = persist_results(&store, context(), &sample()).expect_err("should fail");
        match err {
            EngineError::PersistencePartialFailure {
                saved, total, run, ..
            } => {
                assert_eq!(saved, 1);
                assert_eq!(total, 3);
                assert!(run.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.attempts(), 2);
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn first_write_failure_has_no_run() {
        let store = MemoryStore::new().failing_on_call(1);
        let err = persist_results(&store, context(), &sample()).expect_err("should fail");
        assert_eq!(err.saved_count(), Some(0));
        assert!(err.to_string().contains("after 0 of 3 rows: store unavailable"));
    }

    #[test]
    fn aborted_review_writes_nothing() {
        let store = MemoryStore::new();
        let mut proc = sample();
        let mut reviewer = ScriptedReviewer::new(vec![Confirmation::Abort], Vec::new());
        let outcome =
            run_completion(&store, context(), &mut proc, &mut reviewer, true).expect("complete");
        assert_eq!(
            outcome,
            CompletionOutcome::Aborted {
                step: 0,
                requirement: 1
            }
        );
        assert_eq!(store.attempts(), 0);
    }

    #[test]
    fn declined_save_skips_review() {
        let store = MemoryStore::new();
        let mut proc = sample();
        let mut reviewer = ScriptedReviewer::new(Vec::new(), Vec::new()).declining_save();
        let outcome =
            run_completion(&store, context(), &mut proc, &mut reviewer, true).expect("complete");
        assert_eq!(outcome, CompletionOutcome::Declined);
        assert!(reviewer.asked().is_empty());
        assert_eq!(store.attempts(), 0);
    }

    #[test]
    fn save_prompt_skipped_when_disabled() {
        let store = MemoryStore::new();
        let mut proc = sample();
        let mut reviewer =
            ScriptedReviewer::new(vec![Confirmation::Unmet], vec![Some("no key".to_string())])
                .declining_save();
        let outcome =
            run_completion(&store, context(), &mut proc, &mut reviewer, false).expect("complete");
        assert!(matches!(outcome, CompletionOutcome::Saved(_)));
        let calls = store.calls();
        assert_eq!(calls[1].row.comment.as_deref(), Some("no key"));
    }

    #[test]
    fn empty_procedure_persists_nothing() {
        let store = MemoryStore::new();
        let proc = procedure(vec![step(1, Vec::new())]);
        let report = persist_results(&store, context(), &proc).expect("persist");
        assert_eq!(report, PersistReport { run: None, saved: 0 });
    }
}
