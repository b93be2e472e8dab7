mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use trailstack_core::{ResourceKind, StackStatus};
use trailstack_provisioner::prereq::StaticCheck;
use trailstack_provisioner::{
    CheckResult, DestroyOutcome, DriftDetector, Orchestrator, PrerequisiteCheck, ProvisionerError,
};

use common::*;

const PREFIX: &str = "/prod/audit-foundation";
const BUCKET: &str = "audit-foundation-logs-123456789012";

fn orchestrator(script: Vec<Step>, log: &CallLog, probe: FakeProbe) -> (Orchestrator, Arc<RecordingSink>) {
    let provider = Arc::new(FakeProvider::new("audit-foundation", script, log.clone()));
    let sink = Arc::new(RecordingSink::new(log.clone()));
    let detector = DriftDetector::new(Arc::new(probe))
        .with_retained([trailstack_core::ResourceId::new(ResourceKind::S3Bucket, BUCKET)]);
    let orchestrator = Orchestrator::new(
        controller(provider, Arc::new(ZeroSleeper::default())),
        detector,
        sink.clone(),
        PREFIX,
    );
    (orchestrator, sink)
}

#[tokio::test]
async fn deploy_publishes_outputs_after_create_completes() {
    let log = call_log();
    let mut complete = state("audit-foundation", StackStatus::CreateComplete);
    complete
        .outputs
        .insert("BucketName".to_string(), BUCKET.to_string());
    let probe = FakeProbe::default()
        .with_live(ResourceKind::S3Bucket, BUCKET)
        .with_live(ResourceKind::CloudTrailTrail, "audit-foundation-trail");
    let (orchestrator, sink) = orchestrator(
        vec![
            Step::Absent,
            Step::Status(StackStatus::Creating),
            Step::State(complete),
        ],
        &log,
        probe,
    );

    let report = orchestrator.deploy(&audit_spec(), false).await.unwrap();

    assert_eq!(
        calls(&log),
        vec!["describe", "create", "describe", "describe", "publish"]
    );
    assert_eq!(report.published.len(), 1);
    assert!(report.reconciliation.is_clean());
    assert_eq!(report.reconciliation.managed.len(), 2);
    assert_eq!(
        sink.stored.lock().unwrap().get("BucketName").map(String::as_str),
        Some(BUCKET)
    );
}

#[tokio::test]
async fn failed_deploy_publishes_nothing() {
    let log = call_log();
    let (orchestrator, sink) = orchestrator(
        vec![
            Step::Absent,
            Step::Status(StackStatus::Creating),
            Step::Status(StackStatus::CreateFailed),
        ],
        &log,
        FakeProbe::default(),
    );

    let err = orchestrator.deploy(&audit_spec(), false).await.unwrap_err();

    assert!(matches!(err, ProvisionerError::StackCreateFailed { .. }));
    assert!(!calls(&log).contains(&"publish".to_string()));
    assert!(sink.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn teardown_cleans_up_only_after_stack_is_gone() {
    let log = call_log();
    let (orchestrator, sink) = orchestrator(
        vec![
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::Deleting),
            Step::Status(StackStatus::Deleting),
            Step::Absent,
        ],
        &log,
        FakeProbe::default(),
    );
    sink.stored
        .lock()
        .unwrap()
        .insert("bucket-name".to_string(), BUCKET.to_string());

    let retain = BTreeSet::from(["AuditLogBucket".to_string()]);
    let report = orchestrator
        .teardown("audit-foundation", &retain)
        .await
        .unwrap();

    assert_eq!(
        calls(&log),
        vec![
            "describe",
            "delete",
            "describe",
            "describe",
            "describe",
            "delete_under"
        ]
    );
    assert_eq!(report.parameters_deleted, 1);
    assert_eq!(report.outcome, DestroyOutcome::Deleted { retained: retain });
}

#[tokio::test]
async fn failed_teardown_leaves_published_outputs() {
    let log = call_log();
    let (orchestrator, sink) = orchestrator(
        vec![
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::Deleting),
            Step::Status(StackStatus::DeleteFailed),
        ],
        &log,
        FakeProbe::default(),
    );
    sink.stored
        .lock()
        .unwrap()
        .insert("bucket-name".to_string(), BUCKET.to_string());

    let err = orchestrator
        .teardown("audit-foundation", &BTreeSet::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionerError::StackDeleteFailed { .. }));
    assert!(!calls(&log).contains(&"delete_under".to_string()));
    assert_eq!(sink.stored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_prerequisites_stop_before_any_provider_call() {
    let log = call_log();
    let (orchestrator, _sink) = orchestrator(vec![Step::Absent], &log, FakeProbe::default());
    let checks: Vec<Box<dyn PrerequisiteCheck>> = vec![
        Box::new(StaticCheck::new(CheckResult::fail("credentials", "token expired"))),
        Box::new(StaticCheck::new(CheckResult::pass("template", "7 parameters declared"))),
    ];
    let orchestrator = orchestrator.with_checks(checks);

    let err = orchestrator.deploy(&audit_spec(), false).await.unwrap_err();
    match err {
        ProvisionerError::Prerequisite { failed } => {
            assert_eq!(failed, vec!["credentials: token expired".to_string()]);
        }
        other => panic!("expected prerequisite failure, got {other:?}"),
    }

    let err = orchestrator
        .teardown("audit-foundation", &BTreeSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionerError::Prerequisite { .. }));

    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn inventory_after_teardown_reports_retained_bucket() {
    let log = call_log();
    let probe = FakeProbe::default().with_live(ResourceKind::S3Bucket, BUCKET);
    let provider = Arc::new(FakeProvider::new("audit-foundation", vec![Step::Absent], log.clone()));
    let detector = DriftDetector::new(Arc::new(probe))
        .with_retained(audit_spec().retained_ids())
        .with_discovery(ResourceKind::S3Bucket, "audit-foundation-");
    let orchestrator = Orchestrator::new(
        controller(provider, Arc::new(ZeroSleeper::default())),
        detector,
        Arc::new(RecordingSink::new(log.clone())),
        PREFIX,
    );

    let inventory = orchestrator.inventory(&audit_spec()).await.unwrap();

    assert!(!inventory.is_deployed());
    let reconciliation = &inventory.reconciliation;
    assert!(reconciliation.orphaned.is_empty());
    assert_eq!(reconciliation.retained.len(), 1);
    assert!(inventory.published.is_empty());
}
