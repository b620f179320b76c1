//! Type mismatch detection between the classified and the declared message type.

use crate::core::types::Issue;

/// Text of the mismatch issue, naming both types.
pub fn mismatch_message(actual: &str, expected: &str) -> String {
    format!(
        "Unexpected message type encountered, received a message of type {actual} but expected a message of type {expected}."
    )
}

/// Synthesize a mismatch issue when the types disagree.
///
/// Only fires when `existing` is a present, empty issue list. Prior issues mean
/// the message already failed upstream; an absent list means validity is
/// unknown. Neither case gets a second finding.
pub fn detect_type_mismatch(
    actual: &str,
    expected: &str,
    existing: Option<&[Issue]>,
) -> Option<Issue> {
    if actual == expected {
        return None;
    }
    match existing {
        Some(issues) if issues.is_empty() => Some(Issue::error(mismatch_message(actual, expected))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Severity;

    const NO_ISSUES: &[Issue] = &[];

    #[test]
    fn matching_types_never_produce_issue() {
        assert_eq!(detect_type_mismatch("Void", "Void", Some(NO_ISSUES)), None);
        let prior = [Issue::error("parse failure")];
        assert_eq!(detect_type_mismatch("Void", "Void", Some(prior.as_slice())), None);
        assert_eq!(detect_type_mismatch("Void", "Void", None), None);
    }

    #[test]
    fn mismatch_with_empty_issues_produces_one_error() {
        let issue = detect_type_mismatch("Death Notification", "Death Record", Some(NO_ISSUES))
            .expect("mismatch issue");
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.message.contains("Death Notification"));
        assert!(issue.message.contains("Death Record"));
    }

    /// Prior issues mean the mismatch is a symptom, not a finding.
    #[test]
    fn mismatch_with_prior_issues_does_not_compound() {
        let prior = [Issue::error("could not parse bundle")];
        assert_eq!(detect_type_mismatch("Unknown", "Submission", Some(prior.as_slice())), None);
    }

    #[test]
    fn mismatch_with_absent_issues_does_not_fire() {
        assert_eq!(detect_type_mismatch("Unknown", "Submission", None), None);
    }

    #[test]
    fn mismatch_message_is_stable() {
        assert_eq!(
            mismatch_message("Void", "Submission"),
            "Unexpected message type encountered, received a message of type Void but expected a message of type Submission."
        );
    }
}
