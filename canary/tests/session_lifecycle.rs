//! Session lifecycle tests driving the controller against a scripted repository.
//!
//! These cover whole producing-test sequences: loading, capture, scoring,
//! retries after incomplete runs, and responses that arrive after the user
//! has already moved on to another jurisdiction.

use std::sync::Arc;

use canary::controller::SessionController;
use canary::core::classifier::MessageTypeTable;
use canary::core::session::{NoticeKind, Resolution};
use canary::core::types::{Issue, Phase, Severity};
use canary::error::SessionError;
use canary::test_support::{
    CallGate, ScriptedRepository, completed_payload, message, score_payload, test_payload,
};

const SUBMISSION: &str = "http://nchs.cdc.gov/vrdr_submission";
const VOID: &str = "http://nchs.cdc.gov/vrdr_submission_void";

fn controller(repository: ScriptedRepository) -> SessionController<ScriptedRepository> {
    SessionController::new(repository, MessageTypeTable::vrdr())
}

/// Full lifecycle: incomplete run, recapture with a corrected message, completed run.
///
/// 1. Load record 2 for MA.
/// 2. Declare Submission, capture a Void message: mismatch issue appended.
/// 3. Run: scorer reports 10/4/6, not completed.
/// 4. Recapture a Submission message: issues and results cleared.
/// 5. Run: scorer reports 10/10/0, completed; report view available.
#[tokio::test]
async fn incomplete_run_then_corrected_message_completes() {
    let controller = controller(
        ScriptedRepository::new()
            .with_fetch(Ok(test_payload("42", false)))
            .with_run(Ok(score_payload(10, 4, 6, false)))
            .with_run(Ok(completed_payload(10, 10, 0))),
    );

    controller.select_state("MA").await.expect("select");
    assert_eq!(controller.fetch_test("2").await, Ok(Resolution::Applied));
    assert_eq!(controller.phase().await, Phase::TestLoaded);

    controller
        .declare_expected_type("Submission")
        .await
        .expect("declare");
    let issues = controller
        .capture_message(message(VOID), Some(Vec::new()))
        .await
        .expect("capture");
    assert_eq!(
        issues,
        vec![Issue::error(
            "Unexpected message type encountered, received a message of type Void but expected a message of type Submission."
        )]
    );

    controller.run_test().await.expect("first run");
    let view = controller.view().await;
    assert_eq!(view.phase, Phase::MessageCaptured);
    assert!(!view.show_completed_view);
    assert_eq!(view.results.map(|r| r.summary.incorrect), Some(6));
    assert!(controller.report_view().await.is_none());

    let issues = controller
        .capture_message(message(SUBMISSION), Some(Vec::new()))
        .await
        .expect("recapture");
    assert!(issues.is_empty());
    assert_eq!(controller.view().await.results, None);

    controller.run_test().await.expect("second run");
    let view = controller.view().await;
    assert_eq!(view.phase, Phase::Completed);
    assert!(view.show_completed_view);
    let report = controller.report_view().await.expect("report");
    assert_eq!(report.record_label, "Opioid Death at Home");
    assert_eq!(report.results.summary.correct, 10);

    let runs = controller.repository().recorded_runs();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.test_id == "42"));
}

/// Remote issues come first, the mismatch issue last.
#[tokio::test]
async fn remote_issues_are_kept_without_mismatch() {
    let controller = controller(ScriptedRepository::new().with_fetch(Ok(test_payload("1", false))));
    controller.select_and_fetch("CO", "1").await.expect("load");
    controller
        .declare_expected_type("Submission")
        .await
        .expect("declare");

    let remote = vec![Issue::new("decedent age missing", Severity::Warning)];
    let issues = controller
        .capture_message(message(VOID), Some(remote.clone()))
        .await
        .expect("capture");
    assert_eq!(issues, remote);
    assert_eq!(controller.view().await.actual_type.as_deref(), Some("Void"));
}

/// A fetch answered after the user picked another jurisdiction must not load.
#[tokio::test]
async fn late_fetch_response_for_previous_state_is_discarded() {
    let gate = CallGate::default();
    let controller = Arc::new(controller(
        ScriptedRepository::new()
            .with_fetch(Ok(test_payload("old", false)))
            .with_fetch_gate(gate.clone()),
    ));

    controller.select_state("CO").await.expect("select");
    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.fetch_test("1").await })
    };
    gate.entered().await;
    assert_eq!(controller.phase().await, Phase::Loading);

    controller.select_state("TX").await.expect("reselect");
    gate.release();
    let resolution = pending.await.expect("join");
    assert_eq!(resolution, Ok(Resolution::Stale));

    let view = controller.view().await;
    assert_eq!(view.phase, Phase::StateSelected);
    assert_eq!(view.selected_state.as_deref(), Some("TX"));
    assert_eq!(view.reference_record, None);
    assert_eq!(view.notice, None);
}

/// A fetch whose caller goes away (client disconnect) is abandoned, not left in flight.
#[tokio::test]
async fn cancelled_fetch_clears_in_flight_and_can_be_retried() {
    let gate = CallGate::default();
    let controller = Arc::new(controller(
        ScriptedRepository::new()
            .with_fetch(Ok(test_payload("lost", false)))
            .with_fetch(Ok(test_payload("9", false)))
            .with_fetch_gate(gate.clone()),
    ));

    controller.select_state("MA").await.expect("select");
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.fetch_test("1").await })
    };
    gate.entered().await;
    assert!(controller.view().await.in_flight);

    task.abort();
    assert!(task.await.expect_err("aborted").is_cancelled());

    let view = controller.view().await;
    assert!(!view.in_flight);
    assert_eq!(view.phase, Phase::StateSelected);
    assert_eq!(view.selected_state.as_deref(), Some("MA"));

    gate.release();
    assert_eq!(controller.fetch_test("1").await, Ok(Resolution::Applied));
    assert_eq!(controller.view().await.test_id.as_deref(), Some("9"));
}

/// A cancelled run keeps the captured message so the user can run again.
#[tokio::test]
async fn cancelled_run_keeps_capture_and_can_be_retried() {
    let gate = CallGate::default();
    let controller = Arc::new(controller(
        ScriptedRepository::new()
            .with_fetch(Ok(test_payload("11", false)))
            .with_run(Ok(completed_payload(9, 9, 0)))
            .with_run(Ok(completed_payload(9, 9, 0)))
            .with_run_gate(gate.clone()),
    ));
    controller.select_and_fetch("TX", "1").await.expect("load");
    controller
        .declare_expected_type("Submission")
        .await
        .expect("declare");
    controller
        .capture_message(message(SUBMISSION), Some(Vec::new()))
        .await
        .expect("capture");

    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run_test().await })
    };
    gate.entered().await;
    assert_eq!(controller.phase().await, Phase::Loading);

    task.abort();
    assert!(task.await.expect_err("aborted").is_cancelled());

    let view = controller.view().await;
    assert!(!view.in_flight);
    assert_eq!(view.phase, Phase::MessageCaptured);
    assert!(view.captured_message.is_some());
    assert_eq!(view.results, None);

    gate.release();
    assert_eq!(controller.run_test().await, Ok(Resolution::Applied));
    assert_eq!(controller.phase().await, Phase::Completed);
    assert_eq!(controller.repository().run_calls(), 2);
}

/// Rejections never reach the repository and leave the phase unchanged.
#[tokio::test]
async fn rejected_operations_make_no_remote_calls() {
    let controller = controller(ScriptedRepository::new());

    let err = controller.fetch_test("1").await.expect_err("no state");
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            phase: Phase::Idle,
            ..
        }
    ));
    assert!(controller.run_test().await.is_err());
    assert!(
        controller
            .declare_expected_type("Submission")
            .await
            .is_err()
    );
    assert_eq!(
        controller.select_state("ZZ").await,
        Err(SessionError::UnknownJurisdiction("ZZ".to_string()))
    );

    assert!(controller.repository().fetch_calls().is_empty());
    assert_eq!(controller.repository().run_calls(), 0);
    assert_eq!(controller.phase().await, Phase::Idle);
}

/// A failed run keeps the capture so the user can retry.
#[tokio::test]
async fn failed_run_can_be_retried() {
    let controller = controller(
        ScriptedRepository::new()
            .with_fetch(Ok(test_payload("7", false)))
            .with_run(Err(ScriptedRepository::unavailable()))
            .with_run(Ok(completed_payload(3, 3, 0))),
    );
    controller.select_and_fetch("YC", "5").await.expect("load");
    controller
        .declare_expected_type("Submission")
        .await
        .expect("declare");
    controller
        .capture_message(message(SUBMISSION), None)
        .await
        .expect("capture");

    let err = controller.run_test().await.expect_err("unavailable");
    assert!(err.is_remote());
    let view = controller.view().await;
    assert_eq!(view.phase, Phase::MessageCaptured);
    assert_eq!(
        view.notice.map(|notice| notice.kind),
        Some(NoticeKind::Connectivity)
    );

    assert_eq!(controller.run_test().await, Ok(Resolution::Applied));
    let view = controller.view().await;
    assert_eq!(view.phase, Phase::Completed);
    assert_eq!(view.notice, None);
}

/// A malformed fetch payload leaves the session ready to fetch again.
#[tokio::test]
async fn malformed_fetch_then_retry() {
    let controller = controller(
        ScriptedRepository::new()
            .with_fetch(Err(ScriptedRepository::garbled()))
            .with_fetch(Ok(test_payload("8", false))),
    );
    controller.select_state("WA").await.expect("select");
    let err = controller.fetch_test("3").await.expect_err("garbled");
    assert!(matches!(err, SessionError::MalformedPayload(_)));
    assert_eq!(
        controller.view().await.notice.map(|notice| notice.kind),
        Some(NoticeKind::MalformedPayload)
    );

    assert_eq!(controller.fetch_test("3").await, Ok(Resolution::Applied));
    assert_eq!(controller.view().await.test_id.as_deref(), Some("8"));
    assert_eq!(controller.repository().fetch_calls().len(), 2);
}
