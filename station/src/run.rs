//! Interactive checklist loop for `station run`.
//!
//! The console keeps its own copy of the displayed checklist; the session only
//! sees it when the operator moves between steps.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::complete::PersistReport;
use crate::core::error::EngineError;
use crate::core::types::TargetId;
use crate::io::console::{Command, Console, HELP};
use crate::io::store::ProcedureStore;
use crate::session::{AdvanceOutcome, Session};

/// How an interactive run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    Saved(PersistReport),
    /// The operator quit (or input ended) without saving.
    Quit,
    /// The operator quit after a save that failed part-way.
    PartialFailure { saved: usize, total: usize },
}

/// Run the checklist for `target` until the results are saved or the operator quits.
///
/// The operator may switch to another target on the way; unsaved edits of the
/// current procedure are discarded only after they confirm.
pub fn run_checklist<S, R, W>(
    session: &mut Session<S>,
    console: &mut Console<R, W>,
    mut target: TargetId,
) -> Result<RunExit>
where
    S: ProcedureStore,
    R: BufRead,
    W: Write,
{
    session
        .select_target(target)
        .with_context(|| format!("load procedure for target {target}"))?;
    console.say(HELP)?;

    let mut checked = session.checklist()?;
    let mut failed: Option<(usize, usize)> = None;

    loop {
        let procedure = session.procedure().context("no procedure loaded")?;
        let index = session.selected_step_index().context("no step selected")?;
        console.show_step(procedure, index, &checked)?;

        let Some(command) = console.read_command()? else {
            info!("console input ended");
            return Ok(quit(failed));
        };
        match command {
            Command::Toggle(position) => match checked.get_mut(position) {
                Some(value) => *value = !*value,
                None => console.say(format!("no requirement {}", position + 1))?,
            },
            Command::Previous => {
                session.retreat(&checked)?;
                checked = session.checklist()?;
            }
            Command::Next => match session.advance(&checked, console) {
                Ok(AdvanceOutcome::Moved(_)) => checked = session.checklist()?,
                Ok(AdvanceOutcome::Declined) => {
                    console.say("Results not saved.")?;
                    checked = session.checklist()?;
                }
                Ok(AdvanceOutcome::Aborted { step, requirement }) => {
                    console.say(format!(
                        "Review cancelled at step {} requirement {}.",
                        step + 1,
                        requirement + 1
                    ))?;
                    checked = session.checklist()?;
                }
                Ok(AdvanceOutcome::Saved { report, .. }) => {
                    console.say(saved_message(&report))?;
                    return Ok(RunExit::Saved(report));
                }
                Err(
                    err @ EngineError::PersistencePartialFailure {
                        saved, total, ..
                    },
                ) => {
                    warn!(saved, total, "completion pass failed part-way");
                    console.say(format!("{err}"))?;
                    console.say("Press n to save again as a new run, or q to quit.")?;
                    failed = Some((saved, total));
                    checked = session.checklist()?;
                }
                Err(err) => return Err(err.into()),
            },
            Command::Switch(next) => {
                if session.has_loaded() && !console.confirm_switch(next)? {
                    console.say(format!("Staying on target {target}."))?;
                    continue;
                }
                match session.select_target(next) {
                    Ok(_) => {
                        info!(from = %target, to = %next, "switched target");
                        target = next;
                        failed = None;
                        checked = session.checklist()?;
                    }
                    Err(err) => {
                        warn!(target_id = %next, error = %err, "target switch failed");
                        console.say(format!("Cannot switch to target {next}: {err}"))?;
                    }
                }
            }
            Command::Quit => return Ok(quit(failed)),
            Command::Help => console.say(HELP)?,
            Command::Unknown(input) => {
                console.say(format!("unknown command {input:?}"))?;
                console.say(HELP)?;
            }
        }
    }
}

fn quit(failed: Option<(usize, usize)>) -> RunExit {
    match failed {
        Some((saved, total)) => RunExit::PartialFailure { saved, total },
        None => RunExit::Quit,
    }
}

fn saved_message(report: &PersistReport) -> String {
    match report.run {
        Some(run) => format!("Saved {} result(s) in run {run}.", report.saved),
        None => "Nothing to save: the procedure has no requirements.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::core::types::{OperatorId, ProcedureId};
    use crate::test_support::{MemoryStore, SAMPLE_DEFINITION};

    fn run(store: MemoryStore, input: &str) -> (Result<RunExit>, Session<MemoryStore>, String) {
        let mut session = Session::new(store, OperatorId::new(1));
        let mut console =
            Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), "Why?")
                .expect("console");
        let exit = run_checklist(&mut session, &mut console, TargetId::new(4));
        let output = String::from_utf8(console.into_output()).expect("utf8");
        (exit, session, output)
    }

    fn sample_store() -> MemoryStore {
        MemoryStore::new().with_procedure(
            TargetId::new(4),
            ProcedureId::new(2),
            SAMPLE_DEFINITION,
        )
    }

    const SINGLE_STEP: &str = r#"{"steps": [
        {"step_id": 1, "name": "Earth bond", "description": "", "requirements": ["Bond below 0.1 Ohm"]}
    ]}"#;

    fn two_target_store() -> MemoryStore {
        sample_store().with_procedure(TargetId::new(9), ProcedureId::new(3), SINGLE_STEP)
    }

    #[test]
    fn checks_everything_and_saves() {
        let (exit, session, output) = run(sample_store(), "1\n2\nn\n1\nn\ny\n");
        let exit = exit.expect("run");
        let RunExit::Saved(report) = exit else {
            panic!("expected saved exit");
        };
        assert_eq!(report.saved, 3);
        assert!(session.store().calls().iter().all(|call| call.row.passed));
        assert!(output.contains("Step 2 of 2: Insulation test"));
        assert!(output.contains("Saved 3 result(s) in run 1."));
    }

    #[test]
    fn unchecked_requirement_is_confirmed_with_comment() {
        let input = "1\n2\nn\nn\ny\ny\nmeter flat\n";
        let (exit, session, output) = run(sample_store(), input);
        assert!(matches!(exit.expect("run"), RunExit::Saved(_)));
        let calls = session.store().calls();
        assert!(!calls[2].row.passed);
        assert_eq!(calls[2].row.comment.as_deref(), Some("meter flat"));
        assert!(output.contains("\"Insulation above 1 MOhm\" is not checked."));
    }

    #[test]
    fn previous_keeps_checked_state() {
        let (exit, _session, output) = run(sample_store(), "2\nn\np\nq\n");
        assert_eq!(exit.expect("run"), RunExit::Quit);
        assert!(output.contains("[x] 2. Labels legible"));
        let last_step_one = output.rfind("Step 1 of 2").expect("step 1 shown again");
        assert!(output[last_step_one..].contains("[x] 2. Labels legible"));
    }

    #[test]
    fn cancelled_review_returns_to_last_step() {
        let (exit, session, output) = run(sample_store(), "n\nn\ny\nc\nq\n");
        assert_eq!(exit.expect("run"), RunExit::Quit);
        assert!(output.contains("Review cancelled at step 1 requirement 1."));
        assert_eq!(session.store().attempts(), 0);
    }

    #[test]
    fn partial_failure_then_quit_is_reported() {
        let store = sample_store().failing_on_call(2);
        let (exit, session, output) = run(store, "1\n2\nn\n1\nn\ny\nq\n");
        assert_eq!(
            exit.expect("run"),
            RunExit::PartialFailure { saved: 1, total: 3 }
        );
        assert!(output.contains("after 1 of 3 rows"));
        assert!(session.has_loaded());
    }

    #[test]
    fn declined_switch_keeps_checklist() {
        let (exit, session, output) = run(two_target_store(), "1\nt 9\nn\nq\n");
        assert_eq!(exit.expect("run"), RunExit::Quit);
        assert!(output.contains("Switch to target 9? All unsaved test results will be lost."));
        assert!(output.contains("Staying on target 4."));
        let last = output.rfind("Step 1 of 2").expect("step shown again");
        assert!(output[last..].contains("[x] 1. Enclosure undamaged"));
        assert_eq!(session.loaded().expect("loaded").target, TargetId::new(4));
    }

    #[test]
    fn confirmed_switch_loads_other_procedure_and_saves_against_it() {
        let (exit, session, output) = run(two_target_store(), "1\nt 9\ny\n1\nn\ny\n");
        let RunExit::Saved(report) = exit.expect("run") else {
            panic!("expected saved exit");
        };
        assert_eq!(report.saved, 1);
        assert!(output.contains("Step 1 of 1: Earth bond"));
        let calls = session.store().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].row.requirement, "Bond below 0.1 Ohm");
        assert!(calls[0].row.passed);
    }

    #[test]
    fn switch_to_unknown_target_keeps_current_procedure() {
        let (exit, session, output) = run(sample_store(), "2\nt 77\ny\nq\n");
        assert_eq!(exit.expect("run"), RunExit::Quit);
        assert!(output.contains("Cannot switch to target 77"));
        let last = output.rfind("Step 1 of 2").expect("step shown again");
        assert!(output[last..].contains("[x] 2. Labels legible"));
        assert!(session.has_loaded());
    }

    #[test]
    fn end_of_input_quits_without_saving() {
        let (exit, session, _output) = run(sample_store(), "1\n");
        assert_eq!(exit.expect("run"), RunExit::Quit);
        assert_eq!(session.store().attempts(), 0);
    }

    #[test]
    fn unknown_target_fails_to_start() {
        let (exit, _session, _output) = run(MemoryStore::new(), "q\n");
        let err = exit.expect_err("missing target");
        assert!(format!("{err:#}").contains("test procedure not found"));
    }
}
