//! Shared deterministic types for session core logic.
//!
//! These types are the contracts between the classifier, the mismatch detector,
//! the issue aggregator, the results summarizer and the session state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation finding. Order is display order; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    pub severity: Severity,
}

impl Issue {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }
}

/// A user-produced message handed over by the capture collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Embedded type discriminator (for FHIR messages, the header event URI).
    pub message_type: Option<String>,
    /// Serializable body posted to the scorer.
    pub body: Value,
}

impl Message {
    pub fn new(message_type: Option<String>, body: Value) -> Self {
        Self { message_type, body }
    }

    /// Build a message from a FHIR message bundle.
    ///
    /// The discriminator is the `eventUri` of the first `MessageHeader` entry.
    /// Documents without one still produce a message, with no discriminator.
    pub fn from_bundle(body: Value) -> Self {
        let message_type = header_event_uri(&body).map(str::to_string);
        Self { message_type, body }
    }
}

fn header_event_uri(bundle: &Value) -> Option<&str> {
    bundle
        .get("entry")?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .find(|resource| {
            resource.get("resourceType").and_then(Value::as_str) == Some("MessageHeader")
        })?
        .get("eventUri")?
        .as_str()
}

/// Score counts and completion flag from the remote scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub completed: bool,
}

/// Decoded scorer output: summary counts plus the per-property breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub summary: ResultSummary,
    /// Per-property comparison as returned by the scorer, if any.
    pub breakdown: Option<Value>,
}

/// A test fetched from the test repository.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTest {
    pub test_id: String,
    pub reference_record: Value,
    pub results: TestResults,
}

/// Session phase, derived from the session's typed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    StateSelected,
    Loading,
    TestLoaded,
    TypeDeclared,
    MessageCaptured,
    Completed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::StateSelected => "state_selected",
            Phase::Loading => "loading",
            Phase::TestLoaded => "test_loaded",
            Phase::TypeDeclared => "type_declared",
            Phase::MessageCaptured => "message_captured",
            Phase::Completed => "completed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_bundle_reads_header_event_uri() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "message",
            "entry": [
                {"resource": {
                    "resourceType": "MessageHeader",
                    "eventUri": "http://nchs.cdc.gov/vrdr_submission"
                }},
                {"resource": {"resourceType": "Parameters"}}
            ]
        });
        let message = Message::from_bundle(bundle);
        assert_eq!(
            message.message_type.as_deref(),
            Some("http://nchs.cdc.gov/vrdr_submission")
        );
    }

    #[test]
    fn from_bundle_without_header_has_no_discriminator() {
        let message = Message::from_bundle(json!({"resourceType": "Patient"}));
        assert_eq!(message.message_type, None);
        assert_eq!(message.body["resourceType"], "Patient");
    }

    #[test]
    fn issue_severity_serializes_lowercase() {
        let issue = Issue::error("bad");
        assert_eq!(
            serde_json::to_value(&issue).expect("serialize"),
            json!({"message": "bad", "severity": "error"})
        );
    }
}
