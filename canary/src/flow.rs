//! Orchestration for a single headless `canary run`.

use tracing::info;

use crate::controller::SessionController;
use crate::core::session::SessionView;
use crate::core::types::{Issue, Message, Phase};
use crate::error::SessionResult;
use crate::io::client::TestRepository;

/// Inputs for one end-to-end producing test.
#[derive(Debug, Clone)]
pub struct FlowInput {
    pub state_code: String,
    pub record_id: String,
    pub expected_type: String,
    pub message: Message,
    /// Validator issues for the message; `None` when none were supplied.
    pub issues: Option<Vec<Issue>>,
}

/// Result of a producing test.
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub view: SessionView,
    /// The fetched test was already completed; nothing was submitted.
    pub already_completed: bool,
}

impl FlowOutcome {
    pub fn completed(&self) -> bool {
        self.view.phase == Phase::Completed
    }
}

/// Select, fetch, declare, capture and run in sequence.
///
/// Stops after the fetch when the service reports the test as already
/// completed. Remote failures and rejections are returned as they occur.
pub async fn run_flow<R: TestRepository>(
    controller: &SessionController<R>,
    input: FlowInput,
) -> SessionResult<FlowOutcome> {
    controller
        .select_and_fetch(&input.state_code, &input.record_id)
        .await?;
    if controller.phase().await == Phase::Completed {
        info!(record = %input.record_id, "test already completed");
        return Ok(FlowOutcome {
            view: controller.view().await,
            already_completed: true,
        });
    }

    controller.declare_expected_type(&input.expected_type).await?;
    controller.capture_message(input.message, input.issues).await?;
    controller.run_test().await?;

    Ok(FlowOutcome {
        view: controller.view().await,
        already_completed: false,
    })
}
