use std::time::Duration;

use thiserror::Error;
use trailstack_core::{ResourceFailure, StackStatus};

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("prerequisite check failed: {}", .failed.join("; "))]
    Prerequisite { failed: Vec<String> },

    #[error("stack {name} is busy ({status}); another operation is in flight")]
    StackBusy { name: String, status: StackStatus },

    #[error("stack {name} is in failed state {status}")]
    StackInFailedState { name: String, status: StackStatus },

    #[error("stack {name} creation failed ({status}){}", describe_failures(.failures))]
    StackCreateFailed {
        name: String,
        status: StackStatus,
        failures: Vec<ResourceFailure>,
    },

    #[error("stack {name} update failed ({status}){}", describe_failures(.failures))]
    StackUpdateFailed {
        name: String,
        status: StackStatus,
        failures: Vec<ResourceFailure>,
    },

    #[error("stack {name} deletion failed ({status}){}", describe_failures(.failures))]
    StackDeleteFailed {
        name: String,
        status: StackStatus,
        failures: Vec<ResourceFailure>,
    },

    #[error("wait on stack {name} cancelled; the provider operation is still running")]
    PollCancelled { name: String },

    #[error("stack {name} did not reach a terminal status within {waited:?}")]
    PollTimedOut { name: String, waited: Duration },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider rejected request: {0}")]
    Provider(String),
}

impl ProvisionerError {
    /// Transient errors are retried by the poller; everything else surfaces.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }

    /// Resource-level detail for failed lifecycle operations.
    pub fn failures(&self) -> &[ResourceFailure] {
        match self {
            Self::StackCreateFailed { failures, .. }
            | Self::StackUpdateFailed { failures, .. }
            | Self::StackDeleteFailed { failures, .. } => failures,
            _ => &[],
        }
    }

    /// What the operator should do next.
    pub fn remediation(&self) -> Option<String> {
        let hint = match self {
            Self::Configuration(_) => {
                "set the missing value in the config file or environment and re-run".to_string()
            }
            Self::Prerequisite { .. } => {
                "fix the failed checks (`trailstack check` lists them) before deploying".to_string()
            }
            Self::StackBusy { name, .. } => format!(
                "wait for the in-flight operation on {name} to finish; do not run applies concurrently"
            ),
            Self::StackInFailedState { name, .. } => format!(
                "inspect the stack event log for {name}, then destroy it and retry, \
                 or re-run apply with --auto-recover"
            ),
            Self::StackCreateFailed { name, .. } | Self::StackUpdateFailed { name, .. } => format!(
                "inspect the failed resources above and the event log for {name}; \
                 the stack must be destroyed before it can be recreated"
            ),
            Self::StackDeleteFailed { .. } => {
                "a retained or non-empty resource may be blocking deletion; \
                 resolve its dependents and run destroy again"
                    .to_string()
            }
            Self::PollCancelled { .. } => {
                "re-run the command later to observe the final status".to_string()
            }
            Self::PollTimedOut { .. } => {
                "the operation may still complete; check the stack status before retrying"
                    .to_string()
            }
            Self::ProviderUnavailable(_) => {
                "check network connectivity and provider health, then retry".to_string()
            }
            Self::Provider(_) => return None,
        };
        Some(hint)
    }
}

fn describe_failures(failures: &[ResourceFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let joined = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(": {joined}")
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
