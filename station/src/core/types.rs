//! Shared identifiers and outcomes for the procedure engine.
//!
//! Identifiers mirror the store's integer keys. They are kept as distinct
//! newtypes so a target id can never be passed where a run id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical unit under test (e.g. a switchboard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(i32);

impl TargetId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Procedure definition assigned to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureId(i32);

impl ProcedureId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned id grouping every result written by one completion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i32);

impl RunId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator performing the test. Placeholder until operator identity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(i32);

impl OperatorId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator answer when the completion pass finds an unchecked requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The requirement really was not met; a comment may follow.
    Unmet,
    /// The requirement was met and only left unchecked.
    Met,
    /// Stop the whole review and go back to the checklist.
    Abort,
}

/// Result of the reconciliation sweep over every requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Every requirement was reconciled; results may be written.
    ReadyToPersist,
    /// The operator aborted at the given (step, requirement) position.
    Aborted { step: usize, requirement: usize },
}

/// Position of the navigation cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    NoProcedureLoaded,
    AtStep(usize),
    /// Transient: advance was requested from the last step and the completion
    /// workflow is running.
    AtTerminalReview,
}
