//! Wizard steps and the per-role step plan.

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// A named wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SelectUploadType,
    /// Super users only.
    SelectOrganization,
    SelectFile,
    Validate,
    Process,
    Results,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Self::SelectUploadType => "Select upload type",
            Self::SelectOrganization => "Select organization",
            Self::SelectFile => "Select file",
            Self::Validate => "Validate",
            Self::Process => "Process",
            Self::Results => "Results",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Results)
    }
}

const PRIVILEGED: &[Step] = &[
    Step::SelectUploadType,
    Step::SelectOrganization,
    Step::SelectFile,
    Step::Validate,
    Step::Process,
    Step::Results,
];

const STANDARD: &[Step] = &[
    Step::SelectUploadType,
    Step::SelectFile,
    Step::Validate,
    Step::Process,
    Step::Results,
];

/// Ordered steps for one session, fixed when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    steps: &'static [Step],
}

impl StepPlan {
    pub fn for_role(role: &Role) -> Self {
        let steps = if role.is_privileged() { PRIVILEGED } else { STANDARD };
        Self { steps }
    }

    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a 0-based position.
    pub fn get(&self, index: usize) -> Option<Step> {
        self.steps.get(index).copied()
    }

    pub fn position(&self, step: Step) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    pub fn includes(&self, step: Step) -> bool {
        self.position(step).is_some()
    }
}
