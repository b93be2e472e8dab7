use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use trailstack_core::{ReconciliationReport, ResourceId, ResourceKind, StackSpec, StackState};

use crate::provider::ResourceProbe;

/// Compares declared stack membership against live resource existence.
///
/// Neither the stack record nor the spec is trusted on its own: every
/// declared or tracked id gets a direct existence probe, and each configured
/// kind is listed by name prefix to surface resources nobody declared.
/// Pure read; safe to call at any time.
pub struct DriftDetector {
    probe: Arc<dyn ResourceProbe>,
    retained: BTreeSet<ResourceId>,
    discovery: BTreeMap<ResourceKind, String>,
    read_attributes: bool,
}

impl DriftDetector {
    pub fn new(probe: Arc<dyn ResourceProbe>) -> Self {
        Self {
            probe,
            retained: BTreeSet::new(),
            discovery: BTreeMap::new(),
            read_attributes: true,
        }
    }

    /// Resources that are expected to outlive the stack. Found but not
    /// declared, they are reported as retained, not orphaned.
    pub fn with_retained(mut self, ids: impl IntoIterator<Item = ResourceId>) -> Self {
        self.retained.extend(ids);
        self
    }

    /// List live resources of `kind` whose name starts with `prefix`.
    pub fn with_discovery(mut self, kind: ResourceKind, prefix: impl Into<String>) -> Self {
        self.discovery.insert(kind, prefix.into());
        self
    }

    pub fn without_attributes(mut self) -> Self {
        self.read_attributes = false;
        self
    }

    pub async fn reconcile(&self, spec: &StackSpec, state: &StackState) -> ReconciliationReport {
        // An absent stack declares nothing live; whatever is still found is
        // either retained or orphaned.
        let mut declared = if state.is_absent() {
            BTreeSet::new()
        } else {
            spec.declared_ids()
        };
        declared.extend(state.managed_ids());

        let mut observed = BTreeSet::new();
        let mut unverified = BTreeMap::new();

        for id in &declared {
            match self.probe.exists(id.kind, &id.key).await {
                Ok(true) => {
                    observed.insert(id.clone());
                }
                Ok(false) => {
                    tracing::debug!(resource = %id, "declared resource not found");
                }
                Err(e) => {
                    tracing::warn!(resource = %id, error = %e, "existence probe failed");
                    unverified.insert(id.clone(), e.to_string());
                }
            }
        }

        let mut discovery_errors = BTreeMap::new();
        for (kind, prefix) in &self.discovery {
            match self.probe.discover(*kind, prefix).await {
                Ok(keys) => {
                    for key in keys {
                        let id = ResourceId::new(*kind, key);
                        unverified.remove(&id);
                        observed.insert(id);
                    }
                }
                Err(e) => {
                    tracing::warn!(kind = %kind, prefix = %prefix, error = %e, "discovery failed");
                    discovery_errors.insert(*kind, e.to_string());
                }
            }
        }

        let mut report = ReconciliationReport::compute(
            state.name.clone(),
            declared,
            observed,
            &self.retained,
            unverified,
        )
        .observed_during(state.status);
        report.discovery_errors = discovery_errors;

        if self.read_attributes {
            for id in &report.observed {
                match self.probe.attributes(id.kind, &id.key).await {
                    Ok(attrs) if !attrs.is_empty() => {
                        report.attributes.insert(id.clone(), attrs);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(resource = %id, error = %e, "attribute read failed");
                    }
                }
            }
        }

        tracing::info!(
            stack = %report.stack_name,
            managed = report.managed.len(),
            missing = report.missing.len(),
            orphaned = report.orphaned.len(),
            provisional = report.provisional,
            "reconciliation complete"
        );

        report
    }
}
