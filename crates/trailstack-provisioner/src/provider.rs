use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use trailstack_core::{Parameters, ResourceEvent, ResourceKind, StackState, StackStatus};

use crate::error::ProvisionerError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which mutating call an [`OperationHandle`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Terminal statuses this operation can end in.
    pub fn concludes(self, status: StackStatus) -> bool {
        match self {
            Operation::Create => matches!(
                status,
                StackStatus::CreateComplete | StackStatus::CreateFailed | StackStatus::RollbackComplete
            ),
            Operation::Update => matches!(
                status,
                StackStatus::UpdateComplete
                    | StackStatus::UpdateFailed
                    | StackStatus::UpdateRollbackComplete
            ),
            Operation::Delete => matches!(status, StackStatus::Absent | StackStatus::DeleteFailed),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Returned by every accepted mutating call; handed to the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub stack_name: String,
    pub operation: Operation,
    /// Provider-side id, e.g. the CloudFormation stack id.
    pub provider_id: Option<String>,
    /// Stack status observed before the call was made. A terminal answer
    /// still equal to it may predate the operation.
    pub prior: Option<StackStatus>,
}

impl OperationHandle {
    pub fn new(stack_name: impl Into<String>, operation: Operation) -> Self {
        Self {
            stack_name: stack_name.into(),
            operation,
            provider_id: None,
            prior: None,
        }
    }

    pub fn with_prior(mut self, status: StackStatus) -> Self {
        self.prior = Some(status);
        self
    }

    /// Whether a terminal `status` is the outcome of this operation rather
    /// than a read from before it was accepted.
    pub fn settled_by(&self, status: StackStatus, transitioned: bool) -> bool {
        transitioned || (self.operation.concludes(status) && self.prior != Some(status))
    }
}

/// Outcome of an update request. "No changes" is success, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started(OperationHandle),
    NoChanges,
}

/// The cloud provider that owns stack state.
///
/// Every call is idempotent at the provider. Mutating calls return as soon
/// as the provider accepts them; the poller waits for a terminal status.
///
/// Methods return boxed futures for dyn compatibility.
pub trait ProviderClient: Send + Sync {
    /// Current state, or `None` when the provider has no such stack.
    fn describe<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<StackState>, ProvisionerError>>;

    fn create<'a>(
        &'a self,
        name: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>>;

    fn update<'a>(
        &'a self,
        name: &'a str,
        parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<UpdateOutcome, ProvisionerError>>;

    /// Delete the stack, leaving the listed logical resources in place.
    fn delete<'a>(
        &'a self,
        name: &'a str,
        retain: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>>;

    /// Per-resource event log, oldest first.
    fn list_resource_events<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResourceEvent>, ProvisionerError>>;
}

/// Direct, per-kind existence probes that bypass the stack record.
pub trait ResourceProbe: Send + Sync {
    fn exists<'a>(
        &'a self,
        kind: ResourceKind,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>>;

    /// Keys of every live resource of `kind` whose name starts with
    /// `prefix`. Used to find resources nobody declared.
    fn discover<'a>(
        &'a self,
        kind: ResourceKind,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>>;

    /// Lightweight attribute reads for display (versioning, retention, ...).
    /// Never used for decisions.
    fn attributes<'a>(
        &'a self,
        _kind: ResourceKind,
        _key: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>> {
        Box::pin(async { Ok(BTreeMap::new()) })
    }
}
