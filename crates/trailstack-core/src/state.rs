use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{ResourceId, ResourceKind};
use crate::status::StackStatus;

/// Observed state of a named stack. Owned by the provider; the lifecycle
/// controller only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackState {
    pub name: String,
    pub status: StackStatus,
    /// Provider's reason for the current status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Logical resource id → record.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Output key → published value (bucket name, trail ARN, ...).
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl StackState {
    /// The state of a stack the provider has no record of.
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StackStatus::Absent,
            status_reason: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.status == StackStatus::Absent
    }

    /// Resources the stack record claims to manage, keyed by physical id.
    ///
    /// Records without a physical id or without a probeable kind are
    /// skipped; deleted and retained records are no longer managed.
    pub fn managed_ids(&self) -> BTreeSet<ResourceId> {
        self.resources
            .values()
            .filter(|r| !matches!(r.status, ResourceStatus::Deleted | ResourceStatus::Retained))
            .filter_map(ResourceRecord::id)
            .collect()
    }
}

/// One resource as tracked by the stack record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Provider resource type, e.g. "AWS::S3::Bucket".
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResourceRecord {
    pub fn id(&self) -> Option<ResourceId> {
        match (self.kind, &self.physical_id) {
            (Some(kind), Some(key)) if !key.is_empty() => Some(ResourceId::new(kind, key.clone())),
            _ => None,
        }
    }
}

/// Per-resource status inside a stack record or event log.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Complete,
    Failed,
    Deleted,
    /// Deletion skipped because of a retain policy.
    Retained,
}

impl ResourceStatus {
    /// Map a CloudFormation resource status string (e.g. `CREATE_FAILED`).
    pub fn from_cfn(s: &str) -> Self {
        if s.ends_with("_IN_PROGRESS") {
            ResourceStatus::Pending
        } else if s.ends_with("_FAILED") {
            ResourceStatus::Failed
        } else if s == "DELETE_COMPLETE" {
            ResourceStatus::Deleted
        } else if s == "DELETE_SKIPPED" {
            ResourceStatus::Retained
        } else {
            ResourceStatus::Complete
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Complete => "complete",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Deleted => "deleted",
            ResourceStatus::Retained => "retained",
        };
        f.write_str(s)
    }
}

/// One entry of the provider's per-resource event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub logical_id: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<jiff::Timestamp>,
}

/// Resource-level detail attached to a failed lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub logical_id: String,
    pub reason: String,
}

impl ResourceFailure {
    /// Collect failed resources from an event log (oldest first). A resource
    /// that failed more than once is reported once, with its latest reason.
    pub fn from_events(events: &[ResourceEvent]) -> Vec<ResourceFailure> {
        let mut failures: Vec<ResourceFailure> = Vec::new();
        for event in events.iter().filter(|e| e.status == ResourceStatus::Failed) {
            let reason = event
                .reason
                .clone()
                .unwrap_or_else(|| "no reason reported".to_string());
            match failures.iter_mut().find(|f| f.logical_id == event.logical_id) {
                Some(existing) => existing.reason = reason,
                None => failures.push(ResourceFailure {
                    logical_id: event.logical_id.clone(),
                    reason,
                }),
            }
        }
        failures
    }
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.logical_id, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(logical_id: &str, status: ResourceStatus, reason: Option<&str>) -> ResourceEvent {
        ResourceEvent {
            logical_id: logical_id.to_string(),
            status,
            reason: reason.map(String::from),
            timestamp: None,
        }
    }

    #[test]
    fn failures_keep_latest_reason_per_resource() {
        let events = vec![
            event("AuditTrail", ResourceStatus::Pending, None),
            event("AuditTrail", ResourceStatus::Failed, Some("bucket policy missing")),
            event("AuditLogBucket", ResourceStatus::Complete, None),
            event("AuditTrail", ResourceStatus::Failed, Some("still missing")),
            event("CloudTrailLogsRole", ResourceStatus::Failed, None),
        ];

        let failures = ResourceFailure::from_events(&events);
        assert_eq!(
            failures,
            vec![
                ResourceFailure {
                    logical_id: "AuditTrail".into(),
                    reason: "still missing".into(),
                },
                ResourceFailure {
                    logical_id: "CloudTrailLogsRole".into(),
                    reason: "no reason reported".into(),
                },
            ]
        );
    }

    #[test]
    fn cfn_resource_statuses_map() {
        assert_eq!(ResourceStatus::from_cfn("CREATE_IN_PROGRESS"), ResourceStatus::Pending);
        assert_eq!(ResourceStatus::from_cfn("UPDATE_FAILED"), ResourceStatus::Failed);
        assert_eq!(ResourceStatus::from_cfn("DELETE_SKIPPED"), ResourceStatus::Retained);
        assert_eq!(ResourceStatus::from_cfn("CREATE_COMPLETE"), ResourceStatus::Complete);
    }

    #[test]
    fn managed_ids_skip_deleted_and_unidentified_records() {
        let mut state = StackState::absent("audit-foundation");
        state.resources.insert(
            "AuditLogBucket".into(),
            ResourceRecord {
                resource_type: "AWS::S3::Bucket".into(),
                kind: Some(ResourceKind::S3Bucket),
                physical_id: Some("logs".into()),
                status: ResourceStatus::Complete,
                reason: None,
            },
        );
        state.resources.insert(
            "AuditBucketPolicy".into(),
            ResourceRecord {
                resource_type: "AWS::S3::BucketPolicy".into(),
                kind: None,
                physical_id: Some("logs".into()),
                status: ResourceStatus::Complete,
                reason: None,
            },
        );
        state.resources.insert(
            "OldRole".into(),
            ResourceRecord {
                resource_type: "AWS::IAM::Role".into(),
                kind: Some(ResourceKind::IamRole),
                physical_id: Some("old".into()),
                status: ResourceStatus::Deleted,
                reason: None,
            },
        );

        let ids = state.managed_ids();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&ResourceId::new(ResourceKind::S3Bucket, "logs")));
    }
}
