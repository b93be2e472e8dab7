//! trailstack-core
//!
//! Pure domain types for the audit-foundation stack lifecycle: declared
//! specs, observed stack state, lifecycle statuses, and reconciliation
//! reports. No AWS SDK dependency; this is the shared vocabulary of the
//! trailstack system.

pub mod error;
pub mod param_keys;
pub mod report;
pub mod resource;
pub mod spec;
pub mod state;
pub mod status;

pub use crate::error::CoreError;
pub use crate::report::ReconciliationReport;
pub use crate::resource::{ResourceDescriptor, ResourceId, ResourceKind};
pub use crate::spec::{Parameters, StackSpec};
pub use crate::state::{ResourceEvent, ResourceFailure, ResourceRecord, ResourceStatus, StackState};
pub use crate::status::StackStatus;
