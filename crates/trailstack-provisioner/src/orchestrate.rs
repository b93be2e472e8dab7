use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use trailstack_core::{ReconciliationReport, StackSpec, StackState};

use crate::audit::{AuditAction, AuditEvent};
use crate::drift::DriftDetector;
use crate::error::ProvisionerError;
use crate::lifecycle::{ApplyOutcome, DestroyOutcome, LifecycleController};
use crate::prereq::{run_checks, PrerequisiteCheck, PrerequisiteReport};
use crate::sink::PublicationSink;

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub prerequisites: PrerequisiteReport,
    pub outcome: ApplyOutcome,
    pub reconciliation: ReconciliationReport,
    /// Outputs written to the publication sink, keyed by output name.
    pub published: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub outcome: DestroyOutcome,
    pub parameters_deleted: usize,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub state: StackState,
    pub reconciliation: ReconciliationReport,
    pub published: BTreeMap<String, String>,
}

impl Inventory {
    /// An absent stack is "nothing to report", not an error.
    pub fn is_deployed(&self) -> bool {
        !self.state.is_absent()
    }
}

/// The end-to-end flows: prerequisites, lifecycle, verification, and
/// publication, in the order that keeps published state truthful.
///
/// - publish only after apply reached a successful terminal status
/// - clean up published parameters only after the stack is confirmed absent
pub struct Orchestrator {
    controller: LifecycleController,
    detector: DriftDetector,
    sink: Arc<dyn PublicationSink>,
    checks: Vec<Box<dyn PrerequisiteCheck>>,
    parameter_prefix: String,
}

impl Orchestrator {
    pub fn new(
        controller: LifecycleController,
        detector: DriftDetector,
        sink: Arc<dyn PublicationSink>,
        parameter_prefix: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            detector,
            sink,
            checks: Vec::new(),
            parameter_prefix: parameter_prefix.into(),
        }
    }

    pub fn with_checks(mut self, checks: Vec<Box<dyn PrerequisiteCheck>>) -> Self {
        self.checks = checks;
        self
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn parameter_prefix(&self) -> &str {
        &self.parameter_prefix
    }

    pub async fn check(&self) -> PrerequisiteReport {
        run_checks(&self.checks).await
    }

    /// prerequisites → apply → reconcile → publish outputs.
    pub async fn deploy(
        &self,
        spec: &StackSpec,
        auto_recover_failed: bool,
    ) -> Result<DeployReport, ProvisionerError> {
        let prerequisites = self.check().await.into_result()?;

        let outcome = self.controller.apply(spec, auto_recover_failed).await?;
        let reconciliation = self.detector.reconcile(spec, &outcome.state).await;

        let published = outcome.state.outputs.clone();
        if published.is_empty() {
            tracing::info!(stack = %spec.name, "stack has no outputs to publish");
        } else {
            self.sink.publish(&self.parameter_prefix, &published).await?;
            AuditEvent::new(
                AuditAction::PublishOutputs,
                &self.parameter_prefix,
                self.controller.actor(),
            )
            .with_details(serde_json::json!({
                "stack": spec.name,
                "keys": published.keys().collect::<Vec<_>>(),
            }))
            .emit();
        }

        Ok(DeployReport {
            prerequisites,
            outcome,
            reconciliation,
            published,
        })
    }

    /// prerequisites → destroy → (stack absent) → delete published outputs.
    ///
    /// A failed or cancelled destroy returns before any cleanup.
    pub async fn teardown(
        &self,
        name: &str,
        retain: &BTreeSet<String>,
    ) -> Result<TeardownReport, ProvisionerError> {
        self.check().await.into_result()?;

        let outcome = self.controller.destroy(name, retain).await?;

        let parameters_deleted = self.sink.delete_under(&self.parameter_prefix).await?;
        if parameters_deleted > 0 {
            AuditEvent::new(
                AuditAction::DeleteOutputs,
                &self.parameter_prefix,
                self.controller.actor(),
            )
            .with_details(serde_json::json!({ "stack": name, "deleted": parameters_deleted }))
            .emit();
        }
        tracing::info!(
            stack = %name,
            prefix = %self.parameter_prefix,
            deleted = parameters_deleted,
            "published outputs cleaned up"
        );

        Ok(TeardownReport {
            outcome,
            parameters_deleted,
        })
    }

    /// Read-only view: stack state, reconciliation, and published outputs.
    pub async fn inventory(&self, spec: &StackSpec) -> Result<Inventory, ProvisionerError> {
        let state = self.controller.current(&spec.name).await?;
        let reconciliation = self.detector.reconcile(spec, &state).await;
        let published = self.sink.list_under(&self.parameter_prefix).await?;

        Ok(Inventory {
            state,
            reconciliation,
            published,
        })
    }
}
