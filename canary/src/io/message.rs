//! Message and issue files for headless capture.
//!
//! Stands in for the interactive capture widget: a message is read from a FHIR
//! message bundle on disk, and validator issues from a JSON array.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::core::types::{Issue, Message};

/// Load a FHIR message bundle as a captured [`Message`].
pub fn load_message(path: &Path) -> Result<Message> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let body: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse message {}", path.display()))?;
    let message = Message::from_bundle(body);
    debug!(path = %path.display(), discriminator = ?message.message_type, "message loaded");
    Ok(message)
}

/// Load validator issues (`[{"message": ..., "severity": ...}]`).
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let issues: Vec<Issue> = serde_json::from_str(&contents)
        .with_context(|| format!("parse issues {}", path.display()))?;
    debug!(path = %path.display(), count = issues.len(), "issues loaded");
    Ok(issues)
}
