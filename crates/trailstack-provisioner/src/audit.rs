use std::fmt;

use serde::Serialize;

/// Every mutating step the engine takes on the operator's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateStack,
    UpdateStack,
    DeleteStack,
    PublishOutputs,
    DeleteOutputs,
    DeleteBucket,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::CreateStack => "create_stack",
            AuditAction::UpdateStack => "update_stack",
            AuditAction::DeleteStack => "delete_stack",
            AuditAction::PublishOutputs => "publish_outputs",
            AuditAction::DeleteOutputs => "delete_outputs",
            AuditAction::DeleteBucket => "delete_bucket",
        }
    }

    /// What kind of thing `target` names for this action.
    pub fn target_kind(self) -> &'static str {
        match self {
            AuditAction::CreateStack | AuditAction::UpdateStack | AuditAction::DeleteStack => {
                "stack"
            }
            AuditAction::PublishOutputs | AuditAction::DeleteOutputs => "parameter_prefix",
            AuditAction::DeleteBucket => "s3_bucket",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of one mutating call, emitted through `tracing` under
/// the `audit.*` fields.
///
/// CloudTrail records the raw API calls; these add which stack, which
/// operation, and who asked.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub target: String,
    pub actor: String,
    pub at: jiff::Timestamp,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, target: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            actor: actor.into(),
            at: jiff::Timestamp::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn emit(&self) {
        tracing::info!(
            audit.action = %self.action,
            audit.target_kind = self.action.target_kind(),
            audit.target = %self.target,
            audit.actor = %self.actor,
            audit.at = %self.at,
            audit.details = %self.details,
            "audit event"
        );
    }
}
