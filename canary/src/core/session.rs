//! Producing-test session state machine.
//!
//! The session owns every field of a test run. Fields that only exist from a
//! given step onward live inside the stage that introduces them, and [`Phase`]
//! is derived from the stage rather than tracked separately.
//!
//! Remote calls are split in two: `begin_*` validates the transition, marks the
//! session in flight and hands out a [`RequestTicket`]; `complete_*` applies the
//! outcome only if the ticket is still the pending one. A `select_state` in
//! between invalidates the ticket, so late responses are dropped as
//! [`Resolution::Stale`].

use serde::Serialize;
use serde_json::Value;

use crate::core::classifier::MessageTypeTable;
use crate::core::issues::evaluate_capture;
use crate::core::jurisdictions::find_jurisdiction;
use crate::core::records::record_label;
use crate::core::summarizer::{decode_fetched_test, summarize_results};
use crate::core::types::{Issue, Message, Phase, TestResults};
use crate::error::{SessionError, SessionResult};

const FETCH_TEST: &str = "fetch_test";
const DECLARE_EXPECTED_TYPE: &str = "declare_expected_type";
const CAPTURE_MESSAGE: &str = "capture_message";
const RUN_TEST: &str = "run_test";

/// Identity of one remote call: the session epoch and a per-call counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestTicket {
    pub session: u64,
    pub request: u64,
}

/// Whether a completion was applied or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Connectivity,
    MalformedPayload,
}

/// User-visible notification left by the last failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn from_error(err: &SessionError) -> Self {
        let kind = match err {
            SessionError::MalformedPayload(_) => NoticeKind::MalformedPayload,
            _ => NoticeKind::Connectivity,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Arguments for a test-repository fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: RequestTicket,
    pub state_code: String,
    pub record_id: String,
}

/// Arguments for a scorer run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub ticket: RequestTicket,
    pub expected_type: String,
    pub test_id: String,
    pub body: Value,
}

/// Read-only view handed to the report renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub results: TestResults,
    pub record_label: String,
}

/// Read-only projection for the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: Phase,
    pub in_flight: bool,
    pub selected_state: Option<String>,
    pub record_id: Option<String>,
    pub test_id: Option<String>,
    pub reference_record: Option<Value>,
    pub expected_type: Option<String>,
    pub captured_message: Option<Message>,
    pub actual_type: Option<String>,
    pub issues: Vec<Issue>,
    pub results: Option<TestResults>,
    /// Completed view vs. step-by-step view; a pure function of `phase`.
    pub show_completed_view: bool,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq)]
struct Capture {
    message: Message,
    actual_type: String,
    issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq)]
struct LoadedTest {
    record_id: String,
    test_id: String,
    reference_record: Value,
    expected_type: Option<String>,
    capture: Option<Capture>,
    results: Option<TestResults>,
    completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Idle,
    Selected { state_code: String },
    Loaded { state_code: String, test: LoadedTest },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKind {
    Fetch { record_id: String },
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    ticket: RequestTicket,
    kind: PendingKind,
}

/// One single-user, strictly sequential producing-test session.
#[derive(Debug, Clone)]
pub struct TestSession {
    table: MessageTypeTable,
    epoch: u64,
    requests: u64,
    stage: Stage,
    pending: Option<Pending>,
    notice: Option<Notice>,
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new(MessageTypeTable::default())
    }
}

impl TestSession {
    pub fn new(table: MessageTypeTable) -> Self {
        Self {
            table,
            epoch: 0,
            requests: 0,
            stage: Stage::Idle,
            pending: None,
            notice: None,
        }
    }

    pub fn message_types(&self) -> &MessageTypeTable {
        &self.table
    }

    /// Current phase; `Loading` while a remote call is pending.
    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::Loading
        } else {
            self.settled_phase()
        }
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.phase() == Phase::Completed
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn selected_state(&self) -> Option<&str> {
        match &self.stage {
            Stage::Idle => None,
            Stage::Selected { state_code } | Stage::Loaded { state_code, .. } => {
                Some(state_code.as_str())
            }
        }
    }

    pub fn reference_record(&self) -> Option<&Value> {
        self.loaded().map(|test| &test.reference_record)
    }

    pub fn expected_type(&self) -> Option<&str> {
        self.loaded().and_then(|test| test.expected_type.as_deref())
    }

    pub fn actual_type(&self) -> Option<&str> {
        self.capture().map(|capture| capture.actual_type.as_str())
    }

    pub fn captured_message(&self) -> Option<&Message> {
        self.capture().map(|capture| &capture.message)
    }

    pub fn issues(&self) -> &[Issue] {
        self.capture()
            .map(|capture| capture.issues.as_slice())
            .unwrap_or_default()
    }

    pub fn results(&self) -> Option<&TestResults> {
        self.loaded().and_then(|test| test.results.as_ref())
    }

    /// Reinitialize the session for a jurisdiction. Legal from any phase.
    ///
    /// Any in-flight call becomes stale.
    pub fn select_state(&mut self, state_code: &str) -> SessionResult<()> {
        let jurisdiction = find_jurisdiction(state_code)
            .ok_or_else(|| SessionError::UnknownJurisdiction(state_code.trim().to_string()))?;
        self.epoch += 1;
        self.pending = None;
        self.notice = None;
        self.stage = Stage::Selected {
            state_code: jurisdiction.code.to_string(),
        };
        Ok(())
    }

    /// Drop all session state (the user navigated away).
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.notice = None;
        self.stage = Stage::Idle;
    }

    /// Start fetching the test for `record_id` in the selected jurisdiction.
    pub fn begin_fetch(&mut self, record_id: &str) -> SessionResult<FetchRequest> {
        self.ensure_not_in_flight(FETCH_TEST)?;
        let state_code = match &self.stage {
            Stage::Selected { state_code } => state_code.clone(),
            _ => return Err(self.rejected(FETCH_TEST)),
        };
        let record_id = record_id.trim();
        if record_id.is_empty() {
            return Err(SessionError::InvalidInput(
                "record id must not be empty".to_string(),
            ));
        }

        let ticket = self.issue_ticket();
        self.pending = Some(Pending {
            ticket,
            kind: PendingKind::Fetch {
                record_id: record_id.to_string(),
            },
        });
        Ok(FetchRequest {
            ticket,
            state_code,
            record_id: record_id.to_string(),
        })
    }

    /// Apply the outcome of a fetch.
    ///
    /// On failure the session stays in `StateSelected` with nothing retained
    /// from the attempt, and the error is returned after being recorded as
    /// the current notice.
    pub fn complete_fetch(
        &mut self,
        ticket: RequestTicket,
        outcome: SessionResult<Value>,
    ) -> SessionResult<Resolution> {
        let record_id = match &self.pending {
            Some(Pending {
                ticket: pending,
                kind: PendingKind::Fetch { record_id },
            }) if *pending == ticket => record_id.clone(),
            _ => return Ok(Resolution::Stale),
        };
        self.pending = None;

        let state_code = match &self.stage {
            Stage::Selected { state_code } => state_code.clone(),
            _ => return Ok(Resolution::Stale),
        };

        match outcome.and_then(|payload| decode_fetched_test(&payload)) {
            Ok(fetched) => {
                self.notice = None;
                self.stage = Stage::Loaded {
                    state_code,
                    test: LoadedTest {
                        record_id,
                        test_id: fetched.test_id,
                        reference_record: fetched.reference_record,
                        expected_type: None,
                        capture: None,
                        completed: fetched.results.summary.completed,
                        results: Some(fetched.results),
                    },
                };
                Ok(Resolution::Applied)
            }
            Err(err) => {
                self.notice = Some(Notice::from_error(&err));
                Err(err)
            }
        }
    }

    /// Declare which message type the user will produce. No network call.
    ///
    /// Re-declaring keeps an already captured message and its issues.
    pub fn declare_expected_type(&mut self, type_name: &str) -> SessionResult<()> {
        self.ensure_not_in_flight(DECLARE_EXPECTED_TYPE)?;
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return Err(SessionError::InvalidInput(
                "expected message type must not be empty".to_string(),
            ));
        }
        let phase = self.phase();
        match &mut self.stage {
            Stage::Loaded { test, .. } if !test.completed => {
                test.expected_type = Some(type_name.to_string());
                self.notice = None;
                Ok(())
            }
            _ => Err(rejected(DECLARE_EXPECTED_TYPE, phase)),
        }
    }

    /// Accept a captured message with the issues reported by the validator.
    ///
    /// Runs classify -> mismatch -> aggregate once for this event and replaces
    /// the message, its type and its issues together. Earlier results are
    /// discarded. `remote_issues = None` means the issue list was absent.
    pub fn capture_message(
        &mut self,
        message: Message,
        remote_issues: Option<Vec<Issue>>,
    ) -> SessionResult<Vec<Issue>> {
        self.ensure_not_in_flight(CAPTURE_MESSAGE)?;
        let phase = self.phase();
        let test = match &mut self.stage {
            Stage::Loaded { test, .. } if !test.completed => test,
            _ => return Err(rejected(CAPTURE_MESSAGE, phase)),
        };
        let Some(expected_type) = test.expected_type.as_deref() else {
            return Err(rejected(CAPTURE_MESSAGE, phase));
        };

        let evaluation =
            evaluate_capture(&self.table, &message, expected_type, remote_issues.as_deref());
        let issues = evaluation.issues.clone();
        test.capture = Some(Capture {
            message,
            actual_type: evaluation.actual_type,
            issues: evaluation.issues,
        });
        test.results = None;
        self.notice = None;
        Ok(issues)
    }

    /// Start scoring the captured message.
    ///
    /// Refused without a captured message, regardless of what the display
    /// layer allows.
    pub fn begin_run(&mut self) -> SessionResult<RunRequest> {
        self.ensure_not_in_flight(RUN_TEST)?;
        let (expected_type, test_id, body) = match &self.stage {
            Stage::Loaded { test, .. } if !test.completed => {
                match (&test.capture, &test.expected_type) {
                    (Some(capture), Some(expected_type)) => (
                        expected_type.clone(),
                        test.test_id.clone(),
                        capture.message.body.clone(),
                    ),
                    _ => return Err(self.rejected(RUN_TEST)),
                }
            }
            _ => return Err(self.rejected(RUN_TEST)),
        };

        let ticket = self.issue_ticket();
        self.pending = Some(Pending {
            ticket,
            kind: PendingKind::Run,
        });
        Ok(RunRequest {
            ticket,
            expected_type,
            test_id,
            body,
        })
    }

    /// Apply the outcome of a scorer run.
    ///
    /// A decoded payload with `completed = false` keeps the session at
    /// `MessageCaptured` with updated results. Failures leave prior results
    /// untouched.
    pub fn complete_run(
        &mut self,
        ticket: RequestTicket,
        outcome: SessionResult<Value>,
    ) -> SessionResult<Resolution> {
        match &self.pending {
            Some(Pending {
                ticket: pending,
                kind: PendingKind::Run,
            }) if *pending == ticket => {}
            _ => return Ok(Resolution::Stale),
        }
        self.pending = None;

        let results = match outcome.and_then(|payload| summarize_results(&payload)) {
            Ok(results) => results,
            Err(err) => {
                self.notice = Some(Notice::from_error(&err));
                return Err(err);
            }
        };

        match &mut self.stage {
            Stage::Loaded { test, .. } => {
                test.completed = results.summary.completed;
                test.results = Some(results);
                self.notice = None;
                Ok(Resolution::Applied)
            }
            _ => Ok(Resolution::Stale),
        }
    }

    /// Clear the pending call for `ticket` when its outcome will never arrive.
    ///
    /// The session returns to its pre-call phase with everything it held before
    /// the launch. Returns `false` if `ticket` is no longer the pending call.
    pub fn abandon(&mut self, ticket: RequestTicket) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Results and record label for the report renderer; only once completed.
    pub fn report_view(&self) -> Option<ReportView> {
        if self.pending.is_some() {
            return None;
        }
        let test = self.loaded().filter(|test| test.completed)?;
        Some(ReportView {
            results: test.results.clone()?,
            record_label: record_label(&test.record_id).to_string(),
        })
    }

    pub fn view(&self) -> SessionView {
        let phase = self.phase();
        let loaded = self.loaded();
        SessionView {
            phase,
            in_flight: self.in_flight(),
            selected_state: self.selected_state().map(str::to_string),
            record_id: loaded.map(|test| test.record_id.clone()),
            test_id: loaded.map(|test| test.test_id.clone()),
            reference_record: self.reference_record().cloned(),
            expected_type: self.expected_type().map(str::to_string),
            captured_message: self.captured_message().cloned(),
            actual_type: self.actual_type().map(str::to_string),
            issues: self.issues().to_vec(),
            results: self.results().cloned(),
            show_completed_view: phase == Phase::Completed,
            notice: self.notice.clone(),
        }
    }

    fn settled_phase(&self) -> Phase {
        match &self.stage {
            Stage::Idle => Phase::Idle,
            Stage::Selected { .. } => Phase::StateSelected,
            Stage::Loaded { test, .. } => {
                if test.completed {
                    Phase::Completed
                } else if test.capture.is_some() {
                    Phase::MessageCaptured
                } else if test.expected_type.is_some() {
                    Phase::TypeDeclared
                } else {
                    Phase::TestLoaded
                }
            }
        }
    }

    fn loaded(&self) -> Option<&LoadedTest> {
        match &self.stage {
            Stage::Loaded { test, .. } => Some(test),
            _ => None,
        }
    }

    fn capture(&self) -> Option<&Capture> {
        self.loaded().and_then(|test| test.capture.as_ref())
    }

    fn issue_ticket(&mut self) -> RequestTicket {
        self.requests += 1;
        RequestTicket {
            session: self.epoch,
            request: self.requests,
        }
    }

    fn ensure_not_in_flight(&self, operation: &'static str) -> SessionResult<()> {
        if self.pending.is_some() {
            return Err(SessionError::InFlight { operation });
        }
        Ok(())
    }

    fn rejected(&self, operation: &'static str) -> SessionError {
        rejected(operation, self.phase())
    }
}

fn rejected(operation: &'static str, phase: Phase) -> SessionError {
    SessionError::InvalidTransition { operation, phase }
}
