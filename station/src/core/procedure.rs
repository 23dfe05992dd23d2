//! In-memory model of a loaded test procedure.
//!
//! Labels and step metadata are fixed once loaded; only `Requirement::completed`
//! and `Requirement::comment` change while the operator works through the steps.

use serde::Serialize;

/// One checkable requirement, identified by its (step, index) position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    label: String,
    pub completed: bool,
    /// Set only when the operator confirms the requirement as unmet.
    pub comment: Option<String>,
}

impl Requirement {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            completed: false,
            comment: None,
        }
    }

    pub fn with_state(label: impl Into<String>, completed: bool, comment: Option<String>) -> Self {
        Self {
            label: label.into(),
            completed,
            comment,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Mark the requirement done or not done. A completed requirement carries no comment.
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        if completed {
            self.comment = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Stable id from the definition, written verbatim with every result.
    pub step_id: i32,
    pub name: String,
    pub description: String,
    /// Display order and persistence order.
    pub requirements: Vec<Requirement>,
    pub equipment_needed: Option<Vec<String>>,
}

impl Step {
    /// Checkbox state as the presentation should display it.
    pub fn checklist(&self) -> Vec<bool> {
        self.requirements.iter().map(|req| req.completed).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Procedure {
    pub steps: Vec<Step>,
    pub safety_requirements: Vec<String>,
}

impl Procedure {
    pub fn requirement_count(&self) -> usize {
        self.steps.iter().map(|step| step.requirements.len()).sum()
    }

    /// Requirements not marked completed, as (step index, requirement index).
    pub fn unmet(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (step_idx, step) in self.steps.iter().enumerate() {
            for (req_idx, req) in step.requirements.iter().enumerate() {
                if !req.completed {
                    out.push((step_idx, req_idx));
                }
            }
        }
        out
    }
}
