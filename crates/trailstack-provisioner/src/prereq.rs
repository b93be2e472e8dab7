//! Prerequisite checks run before any mutating call.
//!
//! Each check returns a structured [`CheckResult`]; [`run_checks`] folds them
//! into a [`PrerequisiteReport`] rather than accumulating pass/fail lists.

use serde::Serialize;

use crate::error::ProvisionerError;
use crate::provider::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass(String),
    /// Worth telling the operator; does not block.
    Warn(String),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub outcome: CheckOutcome,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CheckOutcome::Pass(detail.into()),
        }
    }

    pub fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CheckOutcome::Warn(detail.into()),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CheckOutcome::Fail(detail.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Fail(_))
    }
}

/// One read-only prerequisite: a tool, a credential, a permission.
pub trait PrerequisiteCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Never errors: a check that cannot run reports `Fail`.
    fn run(&self) -> BoxFuture<'_, CheckResult>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrerequisiteReport {
    pub checks: Vec<CheckResult>,
}

impl PrerequisiteReport {
    pub fn passed(&self) -> bool {
        !self.checks.iter().any(CheckResult::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.is_failure())
    }

    /// `PrerequisiteError` naming every failed check.
    pub fn into_result(self) -> Result<Self, ProvisionerError> {
        if self.passed() {
            return Ok(self);
        }
        let failed = self
            .failures()
            .map(|c| match &c.outcome {
                CheckOutcome::Fail(detail) => format!("{}: {detail}", c.name),
                _ => c.name.clone(),
            })
            .collect();
        Err(ProvisionerError::Prerequisite { failed })
    }
}

/// Run every check in order. All checks run even after a failure so the
/// operator sees the full list at once.
pub async fn run_checks(checks: &[Box<dyn PrerequisiteCheck>]) -> PrerequisiteReport {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let result = check.run().await;
        match &result.outcome {
            CheckOutcome::Pass(detail) => {
                tracing::debug!(check = %result.name, detail = %detail, "prerequisite passed")
            }
            CheckOutcome::Warn(detail) => {
                tracing::warn!(check = %result.name, detail = %detail, "prerequisite warning")
            }
            CheckOutcome::Fail(detail) => {
                tracing::warn!(check = %result.name, detail = %detail, "prerequisite failed")
            }
        }
        results.push(result);
    }
    PrerequisiteReport { checks: results }
}

/// Static check over an already-known value, e.g. "region is set".
pub struct StaticCheck {
    name: String,
    result: CheckResult,
}

impl StaticCheck {
    pub fn new(result: CheckResult) -> Self {
        Self {
            name: result.name.clone(),
            result,
        }
    }
}

impl PrerequisiteCheck for StaticCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async { self.result.clone() })
    }
}
