//! Error taxonomy for the procedure engine.
//!
//! Every variant is returned synchronously from the operation that raised it.

use std::fmt;

use thiserror::Error;

use crate::core::types::RunId;

/// One requirement entry that is neither a bare label nor a requirement record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step} requirement {entry}: {reason} (got {found})")]
pub struct MalformedRequirementError {
    /// Zero-based step position within the definition.
    pub step: usize,
    /// Zero-based entry position within the step's requirement list.
    pub entry: usize,
    pub reason: String,
    /// Compact JSON rendering of the offending entry.
    pub found: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("test procedure not found: {0}")]
    ProcedureNotFound(String),

    #[error("procedure definition could not be parsed: {0}")]
    ProcedureParse(String),

    #[error("malformed requirements: {}", MalformedList(.0))]
    MalformedRequirements(Vec<MalformedRequirementError>),

    /// A result write failed part-way through a completion pass. Rows already
    /// written stay in the store.
    #[error(
        "saving results failed after {saved} of {total} rows{}: {reason}",
        run_suffix(.run)
    )]
    PersistencePartialFailure {
        saved: usize,
        total: usize,
        run: Option<RunId>,
        reason: String,
    },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A presentation or store collaborator failed outside of result writes.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl EngineError {
    /// Number of rows durably written before a partial persistence failure.
    pub fn saved_count(&self) -> Option<usize> {
        match self {
            EngineError::PersistencePartialFailure { saved, .. } => Some(*saved),
            _ => None,
        }
    }
}

struct MalformedList<'a>(&'a [MalformedRequirementError]);

impl fmt::Display for MalformedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

fn run_suffix(run: &Option<RunId>) -> String {
    match run {
        Some(run) => format!(" in run {run}"),
        None => String::new(),
    }
}
