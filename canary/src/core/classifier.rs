//! Deterministic classification of message type discriminators.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::Message;

/// Canonical name for messages whose discriminator is missing or unmapped.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// VRDR message event URIs and their canonical type names.
const VRDR_MESSAGE_TYPES: &[(&str, &str)] = &[
    ("http://nchs.cdc.gov/vrdr_submission", "Submission"),
    ("http://nchs.cdc.gov/vrdr_submission_update", "Update"),
    ("http://nchs.cdc.gov/vrdr_acknowledgement", "Acknowledgement"),
    ("http://nchs.cdc.gov/vrdr_submission_void", "Void"),
    ("http://nchs.cdc.gov/vrdr_coding", "Coding"),
    ("http://nchs.cdc.gov/vrdr_coding_update", "CodingUpdate"),
    ("http://nchs.cdc.gov/vrdr_extraction_error", "Error"),
];

/// One discriminator mapping, as exposed to the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageTypeEntry {
    pub discriminator: String,
    pub name: String,
}

/// Fixed discriminator -> canonical-name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTypeTable {
    entries: BTreeMap<String, String>,
}

impl Default for MessageTypeTable {
    fn default() -> Self {
        Self::vrdr()
    }
}

impl MessageTypeTable {
    /// The VRDR message table.
    pub fn vrdr() -> Self {
        Self::from_entries(
            VRDR_MESSAGE_TYPES
                .iter()
                .map(|(key, name)| (key.to_string(), name.to_string())),
        )
    }

    /// Build a table from explicit entries. Empty keys are never matched.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: entries
                .into_iter()
                .filter(|(key, _)| !key.is_empty())
                .collect(),
        }
    }

    /// Return a copy with `overrides` added (replacing existing keys).
    pub fn with_overrides<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries = self.entries.clone();
        for (key, name) in overrides {
            if !key.is_empty() {
                entries.insert(key.clone(), name.clone());
            }
        }
        Self { entries }
    }

    /// Canonical name for a discriminator, if mapped.
    pub fn canonical_name(&self, discriminator: &str) -> Option<&str> {
        self.entries.get(discriminator).map(String::as_str)
    }

    /// Classify a (possibly absent) message. Never fails; unmapped degrades to [`UNKNOWN_TYPE`].
    pub fn classify(&self, message: Option<&Message>) -> String {
        message
            .and_then(|message| message.message_type.as_deref())
            .filter(|discriminator| !discriminator.is_empty())
            .and_then(|discriminator| self.canonical_name(discriminator))
            .unwrap_or(UNKNOWN_TYPE)
            .to_string()
    }

    /// All mappings in discriminator order.
    pub fn entries(&self) -> Vec<MessageTypeEntry> {
        self.entries
            .iter()
            .map(|(discriminator, name)| MessageTypeEntry {
                discriminator: discriminator.clone(),
                name: name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(discriminator: Option<&str>) -> Message {
        Message::new(discriminator.map(str::to_string), json!({}))
    }

    #[test]
    fn classify_absent_message_is_unknown() {
        let table = MessageTypeTable::vrdr();
        assert_eq!(table.classify(None), UNKNOWN_TYPE);
    }

    #[test]
    fn classify_maps_vrdr_submission() {
        let table = MessageTypeTable::vrdr();
        let msg = message(Some("http://nchs.cdc.gov/vrdr_submission"));
        assert_eq!(table.classify(Some(&msg)), "Submission");
    }

    #[test]
    fn classify_unmapped_or_empty_discriminator_is_unknown() {
        let table = MessageTypeTable::vrdr();
        assert_eq!(table.classify(Some(&message(Some("MDN")))), UNKNOWN_TYPE);
        assert_eq!(table.classify(Some(&message(Some("")))), UNKNOWN_TYPE);
        assert_eq!(table.classify(Some(&message(None))), UNKNOWN_TYPE);
    }

    #[test]
    fn classify_uses_custom_table() {
        let table = MessageTypeTable::from_entries([(
            "MDN".to_string(),
            "Death Notification".to_string(),
        )]);
        assert_eq!(
            table.classify(Some(&message(Some("MDN")))),
            "Death Notification"
        );
    }

    #[test]
    fn overrides_replace_and_extend() {
        let overrides = BTreeMap::from([
            (
                "http://nchs.cdc.gov/vrdr_coding".to_string(),
                "Coded".to_string(),
            ),
            ("MDN".to_string(), "Death Notification".to_string()),
        ]);
        let table = MessageTypeTable::vrdr().with_overrides(&overrides);
        assert_eq!(
            table.canonical_name("http://nchs.cdc.gov/vrdr_coding"),
            Some("Coded")
        );
        assert_eq!(table.canonical_name("MDN"), Some("Death Notification"));
        assert_eq!(table.entries().len(), VRDR_MESSAGE_TYPES.len() + 1);
    }
}
