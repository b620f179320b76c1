//! Issue aggregation for a message-capture event.

use crate::core::classifier::MessageTypeTable;
use crate::core::mismatch::detect_type_mismatch;
use crate::core::types::{Issue, Message};

/// Outcome of the classify -> detect -> aggregate pipeline for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvaluation {
    pub actual_type: String,
    pub issues: Vec<Issue>,
}

/// Concatenate remote issues (in order) with the mismatch issue, appended last.
pub fn aggregate_issues(remote: Option<&[Issue]>, mismatch: Option<Issue>) -> Vec<Issue> {
    let mut issues = remote.map(<[Issue]>::to_vec).unwrap_or_default();
    issues.extend(mismatch);
    issues
}

/// Run the capture pipeline over immutable inputs.
pub fn evaluate_capture(
    table: &MessageTypeTable,
    message: &Message,
    expected_type: &str,
    remote_issues: Option<&[Issue]>,
) -> CaptureEvaluation {
    let actual_type = table.classify(Some(message));
    let mismatch = detect_type_mismatch(&actual_type, expected_type, remote_issues);
    CaptureEvaluation {
        issues: aggregate_issues(remote_issues, mismatch),
        actual_type,
    }
}
