use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::resource::{ResourceId, ResourceKind};
use crate::status::StackStatus;

/// Declared-vs-observed comparison for one stack.
///
/// Computed fresh on every inventory or verify; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub stack_name: String,
    pub stack_status: Option<StackStatus>,
    /// Set when the stack was mid-transition: `missing`/`orphaned` are not
    /// authoritative.
    pub provisional: bool,

    pub declared: BTreeSet<ResourceId>,
    pub observed: BTreeSet<ResourceId>,
    /// declared ∩ observed
    pub managed: BTreeSet<ResourceId>,
    /// observed − declared − retained allowlist
    pub orphaned: BTreeSet<ResourceId>,
    /// declared − observed − unverified
    pub missing: BTreeSet<ResourceId>,
    /// observed − declared, excused by the retained-resource allowlist
    pub retained: BTreeSet<ResourceId>,
    /// Probes that errored: neither observed nor missing.
    pub unverified: BTreeMap<ResourceId, String>,
    /// Kinds whose discovery listing failed; orphans of these kinds may be
    /// unreported.
    pub discovery_errors: BTreeMap<ResourceKind, String>,
    /// Display-only attribute reads, e.g. versioning or retention days.
    pub attributes: BTreeMap<ResourceId, BTreeMap<String, String>>,
}

impl ReconciliationReport {
    /// Classify declared and observed ids.
    pub fn compute(
        stack_name: impl Into<String>,
        declared: BTreeSet<ResourceId>,
        observed: BTreeSet<ResourceId>,
        retained_allowlist: &BTreeSet<ResourceId>,
        unverified: BTreeMap<ResourceId, String>,
    ) -> Self {
        let managed = declared.intersection(&observed).cloned().collect();

        let (retained, orphaned): (BTreeSet<_>, BTreeSet<_>) = observed
            .difference(&declared)
            .cloned()
            .partition(|id| retained_allowlist.contains(id));

        let missing = declared
            .difference(&observed)
            .filter(|id| !unverified.contains_key(*id))
            .cloned()
            .collect();

        Self {
            stack_name: stack_name.into(),
            stack_status: None,
            provisional: false,
            declared,
            observed,
            managed,
            orphaned,
            missing,
            retained,
            unverified,
            discovery_errors: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Record the stack status the comparison was taken against.
    pub fn observed_during(mut self, status: StackStatus) -> Self {
        self.stack_status = Some(status);
        self.provisional = !status.is_terminal();
        self
    }

    /// No orphans, nothing missing, every probe answered.
    pub fn is_clean(&self) -> bool {
        !self.has_hazards() && self.unverified.is_empty() && self.discovery_errors.is_empty()
    }

    pub fn has_hazards(&self) -> bool {
        !self.orphaned.is_empty() || !self.missing.is_empty()
    }
}
