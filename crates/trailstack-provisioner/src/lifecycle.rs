use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use trailstack_core::{ResourceFailure, StackSpec, StackState, StackStatus};

use crate::audit::{AuditAction, AuditEvent};
use crate::error::ProvisionerError;
use crate::poll::Poller;
use crate::provider::{OperationHandle, ProviderClient, UpdateOutcome};

/// What an apply actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    /// Failed stack was deleted, then created again.
    Recreated,
    Updated,
    /// Provider reported nothing to change.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub state: StackState,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    AlreadyAbsent,
    Deleted { retained: BTreeSet<String> },
}

/// Drives one named stack to its declared state.
///
/// Concurrency is optimistic: the provider rejects overlapping mutations,
/// which this controller observes as an in-progress status and reports as
/// `StackBusy`. There is no client-side lock.
pub struct LifecycleController {
    provider: Arc<dyn ProviderClient>,
    poller: Poller,
    cancel: CancellationToken,
    actor: String,
}

impl LifecycleController {
    pub fn new(provider: Arc<dyn ProviderClient>, poller: Poller) -> Self {
        Self {
            provider,
            poller,
            cancel: CancellationToken::new(),
            actor: "trailstack".to_string(),
        }
    }

    /// Cancel token observed by every wait. Cancelling it interrupts the
    /// current poll without touching the provider.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Identity recorded on audit events, e.g. the caller ARN.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Current state; a stack the provider does not know is `absent`.
    pub async fn current(&self, name: &str) -> Result<StackState, ProvisionerError> {
        Ok(self
            .provider
            .describe(name)
            .await?
            .unwrap_or_else(|| StackState::absent(name)))
    }

    /// Create or update `spec` so the stack matches it. Safe to re-run.
    ///
    /// A stack in a terminal-failure status is left untouched unless
    /// `auto_recover_failed` is set, in which case it is deleted (waiting
    /// for `absent`) and created again.
    pub async fn apply(
        &self,
        spec: &StackSpec,
        auto_recover_failed: bool,
    ) -> Result<ApplyOutcome, ProvisionerError> {
        let name = spec.name.as_str();
        let mut current = self.current(name).await?;
        let mut recovered = false;

        tracing::info!(stack = %name, status = %current.status, "applying stack");

        if current.status.is_failed() {
            if !auto_recover_failed {
                return Err(ProvisionerError::StackInFailedState {
                    name: name.to_string(),
                    status: current.status,
                });
            }

            tracing::warn!(stack = %name, status = %current.status, "deleting failed stack before recreating");
            let retain = spec.retained_logical_ids();
            self.delete_and_wait(name, &retain, current.status).await?;
            current = StackState::absent(name);
            recovered = true;
        }

        match current.status {
            StackStatus::Absent => {
                let state = self.create(spec).await?;
                let change = if recovered {
                    Change::Recreated
                } else {
                    Change::Created
                };
                Ok(ApplyOutcome { state, change })
            }
            status if status.is_complete() => self.update(spec, current).await,
            status => Err(ProvisionerError::StackBusy {
                name: name.to_string(),
                status,
            }),
        }
    }

    /// Delete the stack, leaving `retain` (logical ids) in place.
    ///
    /// No partial cleanup is attempted when the provider's delete fails.
    pub async fn destroy(
        &self,
        name: &str,
        retain: &BTreeSet<String>,
    ) -> Result<DestroyOutcome, ProvisionerError> {
        let current = self.current(name).await?;

        match current.status {
            StackStatus::Absent => {
                tracing::info!(stack = %name, "stack already absent, nothing to destroy");
                Ok(DestroyOutcome::AlreadyAbsent)
            }
            status if status.is_in_progress() => Err(ProvisionerError::StackBusy {
                name: name.to_string(),
                status,
            }),
            status => {
                self.delete_and_wait(name, retain, status).await?;
                Ok(DestroyOutcome::Deleted {
                    retained: retain.clone(),
                })
            }
        }
    }

    async fn create(&self, spec: &StackSpec) -> Result<StackState, ProvisionerError> {
        let name = spec.name.as_str();
        tracing::info!(stack = %name, parameters = spec.parameters.len(), "creating stack");
        let handle = self.provider.create(name, &spec.parameters).await?;
        AuditEvent::new(AuditAction::CreateStack, name, &self.actor).emit();

        let state = self.wait(&handle).await?;
        if state.status == StackStatus::CreateComplete {
            tracing::info!(stack = %name, outputs = state.outputs.len(), "stack created");
            return Ok(state);
        }

        Err(ProvisionerError::StackCreateFailed {
            name: name.to_string(),
            status: state.status,
            failures: self.failures(name).await,
        })
    }

    async fn update(
        &self,
        spec: &StackSpec,
        current: StackState,
    ) -> Result<ApplyOutcome, ProvisionerError> {
        let name = spec.name.as_str();
        tracing::info!(stack = %name, "updating stack");

        let handle = match self.provider.update(name, &spec.parameters).await? {
            UpdateOutcome::NoChanges => {
                tracing::info!(stack = %name, "no changes to apply");
                // A no-op update settles as a completed update.
                return Ok(ApplyOutcome {
                    state: StackState {
                        status: StackStatus::UpdateComplete,
                        ..current
                    },
                    change: Change::Unchanged,
                });
            }
            UpdateOutcome::Started(handle) => handle.with_prior(current.status),
        };
        AuditEvent::new(AuditAction::UpdateStack, name, &self.actor).emit();

        let state = self.wait(&handle).await?;
        if state.status == StackStatus::UpdateComplete {
            tracing::info!(stack = %name, "stack updated");
            return Ok(ApplyOutcome {
                state,
                change: Change::Updated,
            });
        }

        Err(ProvisionerError::StackUpdateFailed {
            name: name.to_string(),
            status: state.status,
            failures: self.failures(name).await,
        })
    }

    async fn delete_and_wait(
        &self,
        name: &str,
        retain: &BTreeSet<String>,
        prior: StackStatus,
    ) -> Result<(), ProvisionerError> {
        tracing::info!(stack = %name, retain = ?retain, "deleting stack");
        let handle = self.provider.delete(name, retain).await?.with_prior(prior);
        AuditEvent::new(AuditAction::DeleteStack, name, &self.actor)
            .with_details(serde_json::json!({ "retain": retain }))
            .emit();

        let state = self.wait(&handle).await?;
        if state.is_absent() {
            tracing::info!(stack = %name, "stack deleted");
            return Ok(());
        }

        Err(ProvisionerError::StackDeleteFailed {
            name: name.to_string(),
            status: state.status,
            failures: self.failures(name).await,
        })
    }

    async fn wait(&self, handle: &OperationHandle) -> Result<StackState, ProvisionerError> {
        self.poller
            .wait_for_terminal(self.provider.as_ref(), handle, &self.cancel)
            .await
    }

    /// Best-effort failure detail. The operation already failed; an event
    /// log we cannot read must not mask that.
    async fn failures(&self, name: &str) -> Vec<ResourceFailure> {
        match self.provider.list_resource_events(name).await {
            Ok(events) => ResourceFailure::from_events(&events),
            Err(e) => {
                tracing::warn!(stack = %name, error = %e, "could not read resource events");
                Vec::new()
            }
        }
    }
}

/// Gate for destructive paths: exact, case-sensitive match with no trimming.
pub fn require_confirmation(token_required: &str, input: &str) -> bool {
    input == token_required
}
