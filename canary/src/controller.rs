//! Session controller: drives the core state machine against a [`TestRepository`].
//!
//! The session lock is never held across a remote call. Each call is launched
//! with the ticket handed out by the state machine and its outcome is fed back
//! with the same ticket, so responses for a replaced session are dropped.
//! A call whose future is dropped before it resolves (a client disconnect, a
//! cancelled task) is abandoned, so the session never stays in flight.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::MessageTypeTable;
use crate::core::session::{ReportView, RequestTicket, Resolution, SessionView, TestSession};
use crate::core::types::{Issue, Message, Phase};
use crate::error::{SessionError, SessionResult};
use crate::io::client::TestRepository;

/// Owns one session and the repository it talks to.
pub struct SessionController<R> {
    repository: R,
    session: Mutex<TestSession>,
}

/// Clears the pending call on drop unless its outcome was handed back.
struct InFlightCall<'a> {
    session: &'a Mutex<TestSession>,
    ticket: Option<RequestTicket>,
}

impl<'a> InFlightCall<'a> {
    fn new(session: &'a Mutex<TestSession>, ticket: RequestTicket) -> Self {
        Self {
            session,
            ticket: Some(ticket),
        }
    }

    /// Disarm and take the lock to apply the outcome.
    fn complete(mut self) -> MutexGuard<'a, TestSession> {
        self.ticket = None;
        lock(self.session)
    }
}

impl Drop for InFlightCall<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take()
            && lock(self.session).abandon(ticket)
        {
            warn!(?ticket, "remote call dropped before completion");
        }
    }
}

fn lock(session: &Mutex<TestSession>) -> MutexGuard<'_, TestSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: TestRepository> SessionController<R> {
    pub fn new(repository: R, table: MessageTypeTable) -> Self {
        Self {
            repository,
            session: Mutex::new(TestSession::new(table)),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn view(&self) -> SessionView {
        self.lock().view()
    }

    pub async fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub async fn message_types(&self) -> MessageTypeTable {
        self.lock().message_types().clone()
    }

    /// Report data; `None` unless the session is completed.
    pub async fn report_view(&self) -> Option<ReportView> {
        self.lock().report_view()
    }

    /// Start a new session for a jurisdiction.
    #[instrument(skip(self))]
    pub async fn select_state(&self, state_code: &str) -> SessionResult<()> {
        let mut session = self.lock();
        session.select_state(state_code).inspect_err(log_rejection)?;
        info!(state = ?session.selected_state(), "state selected");
        Ok(())
    }

    /// Reinitialize and drop any session state.
    pub async fn reset(&self) {
        self.lock().reset();
        debug!("session reset");
    }

    /// Fetch the test for `record_id`.
    #[instrument(skip(self))]
    pub async fn fetch_test(&self, record_id: &str) -> SessionResult<Resolution> {
        let request = self
            .lock()
            .begin_fetch(record_id)
            .inspect_err(log_rejection)?;
        let call = InFlightCall::new(&self.session, request.ticket);

        let outcome = self
            .repository
            .fetch_test(&request.state_code, &request.record_id)
            .await
            .map_err(SessionError::from);

        let mut session = call.complete();
        let resolution = session
            .complete_fetch(request.ticket, outcome)
            .inspect_err(log_remote_failure)?;
        match resolution {
            Resolution::Applied => info!(phase = %session.phase(), "test loaded"),
            Resolution::Stale => {
                debug!(ticket = ?request.ticket, "discarded stale fetch response");
            }
        }
        Ok(resolution)
    }

    /// Select a jurisdiction and fetch the test in one step, as picking a state does.
    pub async fn select_and_fetch(
        &self,
        state_code: &str,
        record_id: &str,
    ) -> SessionResult<Resolution> {
        self.select_state(state_code).await?;
        self.fetch_test(record_id).await
    }

    #[instrument(skip(self))]
    pub async fn declare_expected_type(&self, type_name: &str) -> SessionResult<()> {
        self.lock()
            .declare_expected_type(type_name)
            .inspect_err(log_rejection)
    }

    /// Accept a message from the capture collaborator. Returns the session issues.
    #[instrument(skip_all, fields(discriminator = ?message.message_type))]
    pub async fn capture_message(
        &self,
        message: Message,
        remote_issues: Option<Vec<Issue>>,
    ) -> SessionResult<Vec<Issue>> {
        let mut session = self.lock();
        let issues = session
            .capture_message(message, remote_issues)
            .inspect_err(log_rejection)?;
        info!(
            actual_type = ?session.actual_type(),
            issues = issues.len(),
            "message captured"
        );
        Ok(issues)
    }

    /// Score the captured message.
    #[instrument(skip(self))]
    pub async fn run_test(&self) -> SessionResult<Resolution> {
        let request = self.lock().begin_run().inspect_err(log_rejection)?;
        let call = InFlightCall::new(&self.session, request.ticket);

        let outcome: SessionResult<Value> = self
            .repository
            .run_test(&request.expected_type, &request.test_id, &request.body)
            .await
            .map_err(SessionError::from);

        let mut session = call.complete();
        let resolution = session
            .complete_run(request.ticket, outcome)
            .inspect_err(log_remote_failure)?;
        match resolution {
            Resolution::Applied => info!(
                phase = %session.phase(),
                summary = ?session.results().map(|results| results.summary),
                "test scored"
            ),
            Resolution::Stale => debug!(ticket = ?request.ticket, "discarded stale run response"),
        }
        Ok(resolution)
    }

    fn lock(&self) -> MutexGuard<'_, TestSession> {
        lock(&self.session)
    }
}

fn log_rejection(err: &SessionError) {
    if err.is_rejection() {
        warn!(error = %err, "operation rejected");
    } else {
        debug!(error = %err, "operation refused");
    }
}

fn log_remote_failure(err: &SessionError) {
    warn!(error = %err, "remote call failed");
}
