//! Test-only helpers: a scripted repository and payload builders.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::core::types::Message;
use crate::io::client::{RemoteError, TestRepository};

/// One recorded fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub state_code: String,
    pub record_id: String,
}

/// One recorded run call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCall {
    pub expected_type: String,
    pub test_id: String,
    pub body: Value,
}

/// Holds a remote call until the test releases it.
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl CallGate {
    /// Wait until a call has reached the repository.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call return its scripted response.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn hold(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Default)]
struct Script {
    fetches: VecDeque<Result<Value, RemoteError>>,
    runs: VecDeque<Result<Value, RemoteError>>,
    fetch_calls: Vec<FetchCall>,
    run_calls: Vec<RunCall>,
}

/// Repository that replays queued responses and records every call.
///
/// An exhausted queue answers with a 404 status error.
#[derive(Debug, Default)]
pub struct ScriptedRepository {
    script: Mutex<Script>,
    fetch_gate: Option<CallGate>,
    run_gate: Option<CallGate>,
}

impl ScriptedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(self, response: Result<Value, RemoteError>) -> Self {
        self.lock().fetches.push_back(response);
        self
    }

    pub fn with_run(self, response: Result<Value, RemoteError>) -> Self {
        self.lock().runs.push_back(response);
        self
    }

    /// Hold every fetch on `gate` before answering.
    pub fn with_fetch_gate(mut self, gate: CallGate) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    /// Hold every run on `gate` before answering.
    pub fn with_run_gate(mut self, gate: CallGate) -> Self {
        self.run_gate = Some(gate);
        self
    }

    /// A 503 from the service.
    pub fn unavailable() -> RemoteError {
        RemoteError::Status {
            url: "http://canary.test/api".to_string(),
            status: 503,
        }
    }

    /// A body that is not JSON.
    pub fn garbled() -> RemoteError {
        let source = serde_json::from_str::<Value>("<html>").expect_err("not json");
        RemoteError::Decode {
            url: "http://canary.test/api".to_string(),
            source,
        }
    }

    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.lock().fetch_calls.clone()
    }

    pub fn run_calls(&self) -> usize {
        self.lock().run_calls.len()
    }

    pub fn recorded_runs(&self) -> Vec<RunCall> {
        self.lock().run_calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exhausted(kind: &str) -> RemoteError {
        RemoteError::Status {
            url: format!("http://canary.test/{kind}"),
            status: 404,
        }
    }
}

impl TestRepository for ScriptedRepository {
    async fn fetch_test(&self, state_code: &str, record_id: &str) -> Result<Value, RemoteError> {
        let response = {
            let mut script = self.lock();
            script.fetch_calls.push(FetchCall {
                state_code: state_code.to_string(),
                record_id: record_id.to_string(),
            });
            script.fetches.pop_front()
        };
        if let Some(gate) = &self.fetch_gate {
            gate.hold().await;
        }
        response.unwrap_or_else(|| Err(Self::exhausted("fetch")))
    }

    async fn run_test(
        &self,
        expected_type: &str,
        test_id: &str,
        body: &Value,
    ) -> Result<Value, RemoteError> {
        let response = {
            let mut script = self.lock();
            script.run_calls.push(RunCall {
                expected_type: expected_type.to_string(),
                test_id: test_id.to_string(),
                body: body.clone(),
            });
            script.runs.pop_front()
        };
        if let Some(gate) = &self.run_gate {
            gate.hold().await;
        }
        response.unwrap_or_else(|| Err(Self::exhausted("run")))
    }
}

/// A fetched-test payload as the service returns it.
pub fn test_payload(test_id: &str, completed: bool) -> Value {
    json!({
        "testId": test_id,
        "referenceRecord": {"resourceType": "Bundle", "id": format!("ref-{test_id}")},
        "results": null,
        "completedBool": completed
    })
}

/// A scorer payload with nested counts.
pub fn completed_payload(total: u32, correct: u32, incorrect: u32) -> Value {
    score_payload(total, correct, incorrect, true)
}

pub fn score_payload(total: u32, correct: u32, incorrect: u32, completed: bool) -> Value {
    json!({
        "results": {"total": total, "correct": correct, "incorrect": incorrect},
        "completed": completed
    })
}

/// A minimal VRDR message bundle with the given `eventUri`.
pub fn bundle(event_uri: &str) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "message",
        "entry": [{
            "resource": {"resourceType": "MessageHeader", "eventUri": event_uri}
        }]
    })
}

/// A captured message decoded from [`bundle`].
pub fn message(event_uri: &str) -> Message {
    Message::from_bundle(bundle(event_uri))
}
