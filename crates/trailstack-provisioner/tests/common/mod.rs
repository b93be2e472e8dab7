//! In-memory fakes for the provider, probe, sink, and clock seams.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trailstack_core::{
    Parameters, ResourceDescriptor, ResourceEvent, ResourceId, ResourceKind, StackSpec,
    StackState, StackStatus,
};
use trailstack_provisioner::{
    BoxFuture, LifecycleController, Operation, OperationHandle, PollPolicy, Poller,
    ProviderClient, ProvisionerError, PublicationSink, ResourceProbe, Sleeper, UpdateOutcome,
};

/// Ordered record of every call made against the fakes.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// One scripted `describe` answer.
#[derive(Debug, Clone)]
pub enum Step {
    Absent,
    Status(StackStatus),
    State(StackState),
    Unavailable,
}

pub fn state(name: &str, status: StackStatus) -> StackState {
    StackState {
        status,
        ..StackState::absent(name)
    }
}

/// Provider that replays a script of `describe` answers. The last step
/// repeats once the script runs out.
pub struct FakeProvider {
    name: String,
    script: Mutex<VecDeque<Step>>,
    log: CallLog,
    update_outcome: Mutex<Option<UpdateOutcome>>,
    events: Vec<ResourceEvent>,
    pub deleted_with: Mutex<Option<BTreeSet<String>>>,
}

impl FakeProvider {
    pub fn new(name: &str, script: Vec<Step>, log: CallLog) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            log,
            update_outcome: Mutex::new(None),
            events: Vec::new(),
            deleted_with: Mutex::new(None),
        }
    }

    pub fn with_no_changes(self) -> Self {
        *self.update_outcome.lock().unwrap() = Some(UpdateOutcome::NoChanges);
        self
    }

    pub fn with_events(mut self, events: Vec<ResourceEvent>) -> Self {
        self.events = events;
        self
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Step::Absent)
        }
    }

    fn record(&self, call: &str) {
        self.log.lock().unwrap().push(call.to_string());
    }
}

impl ProviderClient for FakeProvider {
    fn describe<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<StackState>, ProvisionerError>> {
        Box::pin(async move {
            self.record("describe");
            match self.next_step() {
                Step::Absent => Ok(None),
                Step::Status(status) => Ok(Some(state(name, status))),
                Step::State(state) => Ok(Some(state)),
                Step::Unavailable => Err(ProvisionerError::ProviderUnavailable(
                    "Throttling: rate exceeded".to_string(),
                )),
            }
        })
    }

    fn create<'a>(
        &'a self,
        name: &'a str,
        _parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>> {
        Box::pin(async move {
            self.record("create");
            Ok(OperationHandle::new(name, Operation::Create))
        })
    }

    fn update<'a>(
        &'a self,
        name: &'a str,
        _parameters: &'a Parameters,
    ) -> BoxFuture<'a, Result<UpdateOutcome, ProvisionerError>> {
        Box::pin(async move {
            self.record("update");
            Ok(self
                .update_outcome
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| {
                    UpdateOutcome::Started(OperationHandle::new(name, Operation::Update))
                }))
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        retain: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, Result<OperationHandle, ProvisionerError>> {
        Box::pin(async move {
            self.record("delete");
            *self.deleted_with.lock().unwrap() = Some(retain.clone());
            Ok(OperationHandle::new(name, Operation::Delete))
        })
    }

    fn list_resource_events<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ResourceEvent>, ProvisionerError>> {
        Box::pin(async move {
            assert_eq!(name, self.name);
            Ok(self.events.clone())
        })
    }
}

pub fn mutations(log: &CallLog) -> usize {
    calls(log)
        .iter()
        .filter(|c| matches!(c.as_str(), "create" | "update" | "delete"))
        .count()
}

/// Zero-delay clock that remembers every requested delay.
#[derive(Default)]
pub struct ZeroSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl ZeroSleeper {
    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }

    pub fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Sleeper for ZeroSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.slept.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

/// Cancels the token on the first sleep, like an operator pressing Ctrl-C
/// mid-wait.
pub struct CancellingSleeper {
    pub token: CancellationToken,
}

impl Sleeper for CancellingSleeper {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'_, ()> {
        self.token.cancel();
        Box::pin(std::future::pending::<()>())
    }
}

pub fn controller(provider: Arc<FakeProvider>, sleeper: Arc<ZeroSleeper>) -> LifecycleController {
    LifecycleController::new(provider, Poller::new(PollPolicy::default(), sleeper))
}

/// Probe over a fixed set of live resources.
#[derive(Default)]
pub struct FakeProbe {
    live: BTreeSet<ResourceId>,
    broken: BTreeSet<ResourceId>,
    broken_discovery: BTreeSet<ResourceKind>,
}

impl FakeProbe {
    pub fn with_live(mut self, kind: ResourceKind, key: &str) -> Self {
        self.live.insert(ResourceId::new(kind, key));
        self
    }

    pub fn with_broken(mut self, kind: ResourceKind, key: &str) -> Self {
        self.broken.insert(ResourceId::new(kind, key));
        self
    }

    pub fn with_broken_discovery(mut self, kind: ResourceKind) -> Self {
        self.broken_discovery.insert(kind);
        self
    }
}

impl ResourceProbe for FakeProbe {
    fn exists<'a>(
        &'a self,
        kind: ResourceKind,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            let id = ResourceId::new(kind, key);
            if self.broken.contains(&id) {
                return Err(ProvisionerError::Provider("AccessDenied".to_string()));
            }
            Ok(self.live.contains(&id))
        })
    }

    fn discover<'a>(
        &'a self,
        kind: ResourceKind,
        prefix: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            if self.broken_discovery.contains(&kind) {
                return Err(ProvisionerError::Provider("AccessDenied".to_string()));
            }
            Ok(self
                .live
                .iter()
                .filter(|id| id.kind == kind && id.key.starts_with(prefix))
                .map(|id| id.key.clone())
                .collect())
        })
    }

    fn attributes<'a>(
        &'a self,
        kind: ResourceKind,
        _key: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>> {
        Box::pin(async move {
            let mut attrs = BTreeMap::new();
            if kind == ResourceKind::S3Bucket {
                attrs.insert("versioning".to_string(), "Enabled".to_string());
            }
            Ok(attrs)
        })
    }
}

/// Parameter store that shares the provider's call log.
pub struct RecordingSink {
    log: CallLog,
    pub stored: Mutex<BTreeMap<String, String>>,
}

impl RecordingSink {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            stored: Mutex::new(BTreeMap::new()),
        }
    }
}

impl PublicationSink for RecordingSink {
    fn publish<'a>(
        &'a self,
        _prefix: &'a str,
        values: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("publish".to_string());
            self.stored.lock().unwrap().extend(values.clone());
            Ok(())
        })
    }

    fn list_under<'a>(
        &'a self,
        _prefix: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, ProvisionerError>> {
        Box::pin(async move { Ok(self.stored.lock().unwrap().clone()) })
    }

    fn delete_under<'a>(
        &'a self,
        _prefix: &'a str,
    ) -> BoxFuture<'a, Result<usize, ProvisionerError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("delete_under".to_string());
            let mut stored = self.stored.lock().unwrap();
            let n = stored.len();
            stored.clear();
            Ok(n)
        })
    }
}

/// Small spec in the shape of the audit foundation.
pub fn audit_spec() -> StackSpec {
    StackSpec::new("audit-foundation")
        .with_parameter("Environment", "prod")
        .with_resource(
            ResourceDescriptor::new(
                "AuditLogBucket",
                ResourceKind::S3Bucket,
                "audit-foundation-logs-123456789012",
            )
            .retained(),
        )
        .with_resource(ResourceDescriptor::new(
            "AuditTrail",
            ResourceKind::CloudTrailTrail,
            "audit-foundation-trail",
        ))
}
