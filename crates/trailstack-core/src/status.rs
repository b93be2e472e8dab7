use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a named stack, as observed at the provider.
///
/// ```text
/// absent ─► creating ─► create_complete | create_failed | rollback_complete
/// *_complete ─► updating ─► update_complete | update_failed | update_rollback_complete
/// any ─► deleting ─► absent | delete_failed
/// ```
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Absent,
    Creating,
    CreateComplete,
    CreateFailed,
    Updating,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackComplete,
    Deleting,
    DeleteFailed,
    RollbackComplete,
}

impl StackStatus {
    pub const ALL: [StackStatus; 11] = [
        StackStatus::Absent,
        StackStatus::Creating,
        StackStatus::CreateComplete,
        StackStatus::CreateFailed,
        StackStatus::Updating,
        StackStatus::UpdateComplete,
        StackStatus::UpdateFailed,
        StackStatus::UpdateRollbackComplete,
        StackStatus::Deleting,
        StackStatus::DeleteFailed,
        StackStatus::RollbackComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StackStatus::Absent => "absent",
            StackStatus::Creating => "creating",
            StackStatus::CreateComplete => "create_complete",
            StackStatus::CreateFailed => "create_failed",
            StackStatus::Updating => "updating",
            StackStatus::UpdateComplete => "update_complete",
            StackStatus::UpdateFailed => "update_failed",
            StackStatus::UpdateRollbackComplete => "update_rollback_complete",
            StackStatus::Deleting => "deleting",
            StackStatus::DeleteFailed => "delete_failed",
            StackStatus::RollbackComplete => "rollback_complete",
        }
    }

    /// No operation is in flight.
    pub fn is_terminal(self) -> bool {
        !self.is_in_progress()
    }

    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            StackStatus::Creating | StackStatus::Updating | StackStatus::Deleting
        )
    }

    /// Terminal-failure set. A stack here must be deleted and recreated;
    /// it is never retried in place.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            StackStatus::CreateFailed
                | StackStatus::RollbackComplete
                | StackStatus::UpdateRollbackComplete
                | StackStatus::UpdateFailed
                | StackStatus::DeleteFailed
        )
    }

    /// Healthy terminal state that accepts an update.
    pub fn is_complete(self) -> bool {
        matches!(self, StackStatus::CreateComplete | StackStatus::UpdateComplete)
    }

    /// Map a CloudFormation stack status string onto the lifecycle model.
    ///
    /// Rollback and cleanup phases are still in flight, so they fold into
    /// the matching `*ing` status.
    pub fn from_cfn(s: &str) -> Result<Self, CoreError> {
        let status = match s {
            "CREATE_IN_PROGRESS" | "ROLLBACK_IN_PROGRESS" | "REVIEW_IN_PROGRESS" => {
                StackStatus::Creating
            }
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "CREATE_FAILED" | "ROLLBACK_FAILED" => StackStatus::CreateFailed,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "UPDATE_IN_PROGRESS"
            | "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"
            | "UPDATE_ROLLBACK_IN_PROGRESS"
            | "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            | "IMPORT_IN_PROGRESS"
            | "IMPORT_ROLLBACK_IN_PROGRESS" => StackStatus::Updating,
            "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::UpdateComplete,
            "UPDATE_FAILED" | "UPDATE_ROLLBACK_FAILED" | "IMPORT_ROLLBACK_FAILED" => {
                StackStatus::UpdateFailed
            }
            "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => {
                StackStatus::UpdateRollbackComplete
            }
            "DELETE_IN_PROGRESS" => StackStatus::Deleting,
            "DELETE_FAILED" => StackStatus::DeleteFailed,
            "DELETE_COMPLETE" => StackStatus::Absent,
            other => return Err(CoreError::UnknownStatus(other.to_string())),
        };
        Ok(status)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}
