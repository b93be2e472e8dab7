mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trailstack_core::{ResourceEvent, ResourceStatus, StackState, StackStatus};
use trailstack_provisioner::{
    Change, DestroyOutcome, LifecycleController, PollPolicy, Poller, ProvisionerError,
};

use common::*;

#[tokio::test]
async fn apply_creates_absent_stack_and_returns_outputs() {
    let log = call_log();
    let mut complete = state("audit-foundation", StackStatus::CreateComplete);
    complete
        .outputs
        .insert("TrailArn".to_string(), "arn:aws:cloudtrail:us-east-1:123456789012:trail/audit-foundation-trail".to_string());
    complete
        .outputs
        .insert("BucketName".to_string(), "audit-foundation-logs-123456789012".to_string());

    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Absent,
            Step::Status(StackStatus::Creating),
            Step::State(complete),
        ],
        log.clone(),
    ));
    let sleeper = Arc::new(ZeroSleeper::default());
    let controller = controller(provider, sleeper.clone());

    let outcome = controller.apply(&audit_spec(), false).await.unwrap();

    assert_eq!(outcome.change, Change::Created);
    assert_eq!(outcome.state.status, StackStatus::CreateComplete);
    assert_eq!(
        outcome.state.outputs.get("BucketName").map(String::as_str),
        Some("audit-foundation-logs-123456789012")
    );
    assert_eq!(calls(&log), vec!["describe", "create", "describe", "describe"]);
    assert_eq!(sleeper.count(), 1);
    assert_eq!(sleeper.total(), Duration::from_secs(5));
}

#[tokio::test]
async fn apply_twice_without_changes_is_idempotent() {
    let log = call_log();
    let provider = Arc::new(
        FakeProvider::new(
            "audit-foundation",
            vec![Step::Status(StackStatus::CreateComplete)],
            log.clone(),
        )
        .with_no_changes(),
    );
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));
    let spec = audit_spec();

    let first = controller.apply(&spec, false).await.unwrap();
    let second = controller.apply(&spec, false).await.unwrap();

    assert_eq!(first.change, Change::Unchanged);
    assert_eq!(second.change, Change::Unchanged);
    assert_eq!(second.state.status, StackStatus::UpdateComplete);
    assert_eq!(first.state, second.state);
    assert!(!calls(&log).iter().any(|c| c == "create" || c == "delete"));
}

#[tokio::test]
async fn apply_updates_complete_stack() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::Updating),
            Step::Status(StackStatus::Updating),
            Step::Status(StackStatus::UpdateComplete),
        ],
        log.clone(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let outcome = controller.apply(&audit_spec(), false).await.unwrap();

    assert_eq!(outcome.change, Change::Updated);
    assert_eq!(outcome.state.status, StackStatus::UpdateComplete);
}

#[tokio::test]
async fn update_waits_past_a_lagging_complete_status() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::UpdateComplete),
            Step::Status(StackStatus::UpdateComplete),
            Step::Status(StackStatus::Updating),
            Step::Status(StackStatus::UpdateFailed),
        ],
        log.clone(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let err = controller.apply(&audit_spec(), false).await.unwrap_err();

    assert!(
        matches!(
            err,
            ProvisionerError::StackUpdateFailed {
                status: StackStatus::UpdateFailed,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(
        calls(&log),
        vec!["describe", "update", "describe", "describe", "describe"]
    );
}

#[tokio::test]
async fn update_ignores_status_left_over_from_create() {
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::Updating),
            Step::Status(StackStatus::UpdateComplete),
        ],
        call_log(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let outcome = controller.apply(&audit_spec(), false).await.unwrap();

    assert_eq!(outcome.change, Change::Updated);
    assert_eq!(outcome.state.status, StackStatus::UpdateComplete);
}

#[tokio::test]
async fn failed_stack_is_never_touched_without_auto_recover() {
    for status in [
        StackStatus::CreateFailed,
        StackStatus::RollbackComplete,
        StackStatus::UpdateRollbackComplete,
        StackStatus::UpdateFailed,
        StackStatus::DeleteFailed,
    ] {
        let log = call_log();
        let provider = Arc::new(FakeProvider::new(
            "audit-foundation",
            vec![Step::Status(status)],
            log.clone(),
        ));
        let controller = controller(provider, Arc::new(ZeroSleeper::default()));

        let err = controller.apply(&audit_spec(), false).await.unwrap_err();

        assert!(
            matches!(err, ProvisionerError::StackInFailedState { status: s, .. } if s == status),
            "{status}: {err:?}"
        );
        assert_eq!(mutations(&log), 0, "{status}");
    }
}

#[tokio::test]
async fn auto_recover_deletes_then_recreates() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::RollbackComplete),
            Step::Status(StackStatus::Deleting),
            Step::Absent,
            Step::Status(StackStatus::Creating),
            Step::Status(StackStatus::CreateComplete),
        ],
        log.clone(),
    ));
    let controller = controller(provider.clone(), Arc::new(ZeroSleeper::default()));

    let outcome = controller.apply(&audit_spec(), true).await.unwrap();

    assert_eq!(outcome.change, Change::Recreated);
    assert_eq!(outcome.state.status, StackStatus::CreateComplete);
    let mutating: Vec<String> = calls(&log)
        .into_iter()
        .filter(|c| c != "describe")
        .collect();
    assert_eq!(mutating, vec!["delete", "create"]);
    let retained = provider.deleted_with.lock().unwrap().clone().unwrap();
    assert!(retained.contains("AuditLogBucket"));
}

#[tokio::test]
async fn in_progress_stack_is_busy() {
    for status in [
        StackStatus::Creating,
        StackStatus::Updating,
        StackStatus::Deleting,
    ] {
        let log = call_log();
        let provider = Arc::new(FakeProvider::new(
            "audit-foundation",
            vec![Step::Status(status)],
            log.clone(),
        ));
        let controller = controller(provider, Arc::new(ZeroSleeper::default()));

        let err = controller.apply(&audit_spec(), true).await.unwrap_err();
        assert!(matches!(err, ProvisionerError::StackBusy { .. }), "{err:?}");

        let err = controller
            .destroy("audit-foundation", &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::StackBusy { .. }), "{err:?}");

        assert_eq!(mutations(&log), 0);
    }
}

#[tokio::test]
async fn create_failure_reports_failed_resources() {
    let log = call_log();
    let provider = Arc::new(
        FakeProvider::new(
            "audit-foundation",
            vec![
                Step::Absent,
                Step::Status(StackStatus::Creating),
                Step::Status(StackStatus::RollbackComplete),
            ],
            log.clone(),
        )
        .with_events(vec![
            ResourceEvent {
                logical_id: "AuditLogBucket".to_string(),
                status: ResourceStatus::Complete,
                reason: None,
                timestamp: None,
            },
            ResourceEvent {
                logical_id: "AuditTrail".to_string(),
                status: ResourceStatus::Failed,
                reason: Some("Invalid request provided: Incorrect S3 bucket policy".to_string()),
                timestamp: None,
            },
        ]),
    );
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let err = controller.apply(&audit_spec(), false).await.unwrap_err();

    match &err {
        ProvisionerError::StackCreateFailed {
            status, failures, ..
        } => {
            assert_eq!(*status, StackStatus::RollbackComplete);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].logical_id, "AuditTrail");
        }
        other => panic!("expected create failure, got {other:?}"),
    }
    assert!(err.to_string().contains("Incorrect S3 bucket policy"));
}

#[tokio::test]
async fn update_failure_is_reported() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::UpdateComplete),
            Step::Status(StackStatus::Updating),
            Step::Status(StackStatus::UpdateRollbackComplete),
        ],
        log.clone(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let err = controller.apply(&audit_spec(), false).await.unwrap_err();
    assert!(
        matches!(
            err,
            ProvisionerError::StackUpdateFailed {
                status: StackStatus::UpdateRollbackComplete,
                ..
            }
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn destroy_absent_stack_is_a_no_op() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![Step::Absent],
        log.clone(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let outcome = controller
        .destroy("audit-foundation", &Default::default())
        .await
        .unwrap();

    assert_eq!(outcome, DestroyOutcome::AlreadyAbsent);
    assert_eq!(mutations(&log), 0);
}

#[tokio::test]
async fn destroy_failure_is_reported() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![
            Step::Status(StackStatus::CreateComplete),
            Step::Status(StackStatus::Deleting),
            Step::Status(StackStatus::DeleteFailed),
        ],
        log.clone(),
    ));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let err = controller
        .destroy("audit-foundation", &Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionerError::StackDeleteFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn cancelled_wait_leaves_operation_running() {
    let log = call_log();
    let provider = Arc::new(FakeProvider::new(
        "audit-foundation",
        vec![Step::Absent, Step::Status(StackStatus::Creating)],
        log.clone(),
    ));
    let token = CancellationToken::new();
    let sleeper = Arc::new(CancellingSleeper {
        token: token.clone(),
    });
    let controller = LifecycleController::new(provider, Poller::new(PollPolicy::default(), sleeper))
        .with_cancellation(token);

    let err = controller.apply(&audit_spec(), false).await.unwrap_err();

    assert!(matches!(err, ProvisionerError::PollCancelled { .. }), "{err:?}");
    assert_eq!(mutations(&log), 1);
}

#[tokio::test]
async fn current_maps_missing_stack_to_absent() {
    let provider = Arc::new(FakeProvider::new("audit-foundation", vec![Step::Absent], call_log()));
    let controller = controller(provider, Arc::new(ZeroSleeper::default()));

    let current = controller.current("audit-foundation").await.unwrap();
    assert_eq!(current, StackState::absent("audit-foundation"));
}
