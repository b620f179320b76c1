//! Connectathon record labels.

/// Human label for a connectathon record id, used in reports.
pub fn record_label(record_id: &str) -> &'static str {
    match record_id.trim() {
        "1" => "Cancer",
        "2" => "Opioid Death at Home",
        "3" => "Pregnant",
        "4" => "Car accident at work: Full",
        "5" => "Car accident at work: Partial",
        _ => "Undefined",
    }
}
