//! trailstack-provisioner
//!
//! Lifecycle engine for the audit-foundation stack. Library consumed by the
//! `trailstack` CLI.
//!
//! Public API:
//! - `LifecycleController::apply()` / `destroy()`: drive one named stack
//!   to its declared state, polling until terminal
//! - `DriftDetector::reconcile()`: declared vs. live resources
//! - `Orchestrator`: prerequisites → lifecycle → verify → publish
//!
//! The AWS side lives behind the `ProviderClient`, `ResourceProbe`, and
//! `PublicationSink` traits; `aws` holds the SDK-backed implementations.

pub mod audit;
pub mod aws;
pub mod drift;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod orchestrate;
pub mod poll;
pub mod prereq;
pub mod provider;
pub mod sink;

pub use crate::drift::DriftDetector;
pub use crate::error::{format_err_chain, ProvisionerError};
pub use crate::lifecycle::{
    require_confirmation, ApplyOutcome, Change, DestroyOutcome, LifecycleController,
};
pub use crate::manifest::{FoundationSettings, Manifest};
pub use crate::orchestrate::{DeployReport, Inventory, Orchestrator, TeardownReport};
pub use crate::poll::{PollPolicy, Poller, Sleeper, TokioSleeper};
pub use crate::prereq::{CheckOutcome, CheckResult, PrerequisiteCheck, PrerequisiteReport};
pub use crate::provider::{
    BoxFuture, Operation, OperationHandle, ProviderClient, ResourceProbe, UpdateOutcome,
};
pub use crate::sink::PublicationSink;
