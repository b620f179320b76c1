//! HTTP route handlers for the session API.
//!
//! Every mutator answers with the session view after the operation, and
//! broadcasts a change event whether the operation succeeded or not.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use canary::core::classifier::MessageTypeEntry;
use canary::core::session::SessionView;
use canary::core::types::{Issue, Message};
use canary::error::SessionError;
use canary::io::client::TestRepository;
use canary::io::report::render_download;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::state::AppState;

/// Build the API router.
pub fn api_router<R: TestRepository + 'static>() -> Router<AppState<R>> {
    Router::new()
        .route("/health", get(health))
        .route("/message-types", get(message_types::<R>))
        .route("/session", get(get_session::<R>))
        .route("/session/state", post(select_state::<R>))
        .route("/session/fetch", post(fetch_test::<R>))
        .route("/session/type", post(declare_type::<R>))
        .route("/session/message", post(capture_message::<R>))
        .route("/session/run", post(run_test::<R>))
        .route("/session/reset", post(reset::<R>))
        .route("/session/report", get(download_report::<R>))
}

/// JSON error body with the status derived from the session error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidTransition { .. } | SessionError::InFlight { .. } => {
            StatusCode::CONFLICT
        }
        SessionError::UnknownJurisdiction(_) | SessionError::InvalidInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SessionError::Connectivity(_) | SessionError::MalformedPayload(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

type ViewResult = Result<Json<SessionView>, ApiError>;

async fn health() -> &'static str {
    "ok"
}

/// GET /api/message-types - discriminator table used for classification.
async fn message_types<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Json<Vec<MessageTypeEntry>> {
    Json(state.controller.message_types().await.entries())
}

/// GET /api/session - read-only projection of the session.
async fn get_session<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Json<SessionView> {
    Json(state.controller.view().await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectStateRequest {
    state_code: String,
}

/// POST /api/session/state - start a session for a jurisdiction.
async fn select_state<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<SelectStateRequest>,
) -> ViewResult {
    let result = state.controller.select_state(&request.state_code).await;
    finish(&state, result).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest {
    record_id: String,
}

/// POST /api/session/fetch - load the test for a connectathon record.
async fn fetch_test<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<FetchRequest>,
) -> ViewResult {
    state.request_received("fetch_test");
    let result = state.controller.fetch_test(&request.record_id).await;
    finish(&state, result).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeclareTypeRequest {
    expected_type: String,
}

/// POST /api/session/type - declare the message type being produced.
async fn declare_type<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<DeclareTypeRequest>,
) -> ViewResult {
    let result = state
        .controller
        .declare_expected_type(&request.expected_type)
        .await;
    finish(&state, result).await
}

/// Captured message as posted by the capture widget.
///
/// Without `messageType` the discriminator is read from the bundle's
/// `MessageHeader`. `issues` absent means validity is unknown; no mismatch
/// issue is added.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest {
    message: Value,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    issues: Option<Vec<Issue>>,
}

impl CaptureRequest {
    fn into_parts(self) -> (Message, Option<Vec<Issue>>) {
        let message = match self.message_type {
            Some(message_type) => Message::new(Some(message_type), self.message),
            None => Message::from_bundle(self.message),
        };
        (message, self.issues)
    }
}

/// POST /api/session/message - hand over a produced message.
async fn capture_message<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<CaptureRequest>,
) -> ViewResult {
    let (message, issues) = request.into_parts();
    let result = state.controller.capture_message(message, issues).await;
    finish(&state, result).await
}

/// POST /api/session/run - score the captured message.
async fn run_test<R: TestRepository + 'static>(State(state): State<AppState<R>>) -> ViewResult {
    state.request_received("run_test");
    let result = state.controller.run_test().await;
    finish(&state, result).await
}

/// POST /api/session/reset - drop the session (user navigated away).
async fn reset<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Json<SessionView> {
    state.controller.reset().await;
    state.publish().await;
    Json(state.controller.view().await)
}

/// GET /api/session/report - HTML report download; 404 until completed.
async fn download_report<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Result<Response, StatusCode> {
    let view = state
        .controller
        .report_view()
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    let report = render_download(&view).map_err(|err| {
        warn!(error = %format!("{err:#}"), "report rendering failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let disposition = format!("attachment; filename=\"{}\"", report.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.html,
    )
        .into_response())
}

async fn finish<R: TestRepository + 'static, T>(
    state: &AppState<R>,
    result: Result<T, SessionError>,
) -> ViewResult {
    state.publish().await;
    result?;
    Ok(Json(state.controller.view().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use canary::controller::SessionController;
    use canary::core::classifier::MessageTypeTable;
    use canary::core::types::Phase;
    use canary::test_support::{ScriptedRepository, bundle, completed_payload, test_payload};
    use serde_json::json;

    use crate::state::ChangeEvent;

    fn app_state(repository: ScriptedRepository) -> AppState<ScriptedRepository> {
        AppState::new(SessionController::new(repository, MessageTypeTable::vrdr()))
    }

    #[test]
    fn status_mapping_separates_rejections_input_and_remote() {
        let rejected = SessionError::InvalidTransition {
            operation: "run_test",
            phase: Phase::TypeDeclared,
        };
        assert_eq!(status_for(&rejected), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&SessionError::InFlight {
                operation: "fetch_test"
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SessionError::UnknownJurisdiction("ZZ".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&SessionError::MalformedPayload("x".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn capture_request_reads_discriminator_from_bundle() {
        let request: CaptureRequest = serde_json::from_value(json!({
            "message": bundle("http://nchs.cdc.gov/vrdr_coding")
        }))
        .expect("decode");
        let (message, issues) = request.into_parts();
        assert_eq!(
            message.message_type.as_deref(),
            Some("http://nchs.cdc.gov/vrdr_coding")
        );
        assert_eq!(issues, None);
    }

    #[test]
    fn capture_request_explicit_type_wins() {
        let request: CaptureRequest = serde_json::from_value(json!({
            "message": {"resourceType": "Bundle"},
            "messageType": "MDN",
            "issues": []
        }))
        .expect("decode");
        let (message, issues) = request.into_parts();
        assert_eq!(message.message_type.as_deref(), Some("MDN"));
        assert_eq!(issues, Some(Vec::new()));
    }

    #[tokio::test]
    async fn handlers_drive_session_to_completion() {
        let state = app_state(
            ScriptedRepository::new()
                .with_fetch(Ok(test_payload("5", false)))
                .with_run(Ok(completed_payload(2, 2, 0))),
        );
        let mut events = state.event_tx.subscribe();

        let Json(view) = select_state(
            State(state.clone()),
            Json(SelectStateRequest {
                state_code: "MA".to_string(),
            }),
        )
        .await
        .expect("select");
        assert_eq!(view.phase, Phase::StateSelected);

        fetch_test(
            State(state.clone()),
            Json(FetchRequest {
                record_id: "1".to_string(),
            }),
        )
        .await
        .expect("fetch");
        declare_type(
            State(state.clone()),
            Json(DeclareTypeRequest {
                expected_type: "Submission".to_string(),
            }),
        )
        .await
        .expect("declare");
        capture_message(
            State(state.clone()),
            Json(CaptureRequest {
                message: bundle("http://nchs.cdc.gov/vrdr_submission"),
                message_type: None,
                issues: Some(Vec::new()),
            }),
        )
        .await
        .expect("capture");
        let Json(view) = run_test(State(state.clone())).await.expect("run");
        assert_eq!(view.phase, Phase::Completed);
        assert!(view.show_completed_view);

        let response = download_report(State(state.clone())).await.expect("report");
        assert_eq!(response.status(), StatusCode::OK);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(received.contains(&ChangeEvent::RequestReceived {
            operation: "fetch_test"
        }));
        assert_eq!(
            received.last(),
            Some(&ChangeEvent::SessionChanged {
                phase: Phase::Completed,
                in_flight: false
            })
        );
    }

    #[tokio::test]
    async fn capture_without_issue_list_adds_no_mismatch() {
        let state = app_state(ScriptedRepository::new().with_fetch(Ok(test_payload("5", false))));
        state
            .controller
            .select_and_fetch("MA", "1")
            .await
            .expect("load");
        state
            .controller
            .declare_expected_type("Submission")
            .await
            .expect("declare");

        let request: CaptureRequest = serde_json::from_value(json!({
            "message": bundle("http://nchs.cdc.gov/vrdr_coding")
        }))
        .expect("decode");
        let Json(view) = capture_message(State(state.clone()), Json(request))
            .await
            .expect("capture");
        assert_eq!(view.actual_type.as_deref(), Some("Coding"));
        assert!(view.issues.is_empty());
    }

    #[tokio::test]
    async fn rejected_run_is_received_then_conflict_with_unchanged_phase() {
        let state = app_state(ScriptedRepository::new());
        let mut events = state.event_tx.subscribe();

        let err = run_test(State(state.clone())).await.expect_err("rejected");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(
            events.try_recv().ok(),
            Some(ChangeEvent::RequestReceived {
                operation: "run_test"
            })
        );
        assert_eq!(
            events.try_recv().ok(),
            Some(ChangeEvent::SessionChanged {
                phase: Phase::Idle,
                in_flight: false
            })
        );
        assert_eq!(
            download_report(State(state)).await.err(),
            Some(StatusCode::NOT_FOUND)
        );
    }
}
