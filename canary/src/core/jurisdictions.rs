//! Reporting jurisdictions a producing test can be generated for.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Jurisdiction {
    pub code: &'static str,
    pub name: &'static str,
}

const fn j(code: &'static str, name: &'static str) -> Jurisdiction {
    Jurisdiction { code, name }
}

/// US states, DC, territories, and New York City (`YC`), which reports separately.
pub const JURISDICTIONS: &[Jurisdiction] = &[
    j("AL", "Alabama"),
    j("AK", "Alaska"),
    j("AS", "American Samoa"),
    j("AZ", "Arizona"),
    j("AR", "Arkansas"),
    j("CA", "California"),
    j("CO", "Colorado"),
    j("CT", "Connecticut"),
    j("DE", "Delaware"),
    j("DC", "District of Columbia"),
    j("FL", "Florida"),
    j("GA", "Georgia"),
    j("GU", "Guam"),
    j("HI", "Hawaii"),
    j("ID", "Idaho"),
    j("IL", "Illinois"),
    j("IN", "Indiana"),
    j("IA", "Iowa"),
    j("KS", "Kansas"),
    j("KY", "Kentucky"),
    j("LA", "Louisiana"),
    j("ME", "Maine"),
    j("MD", "Maryland"),
    j("MA", "Massachusetts"),
    j("MI", "Michigan"),
    j("MN", "Minnesota"),
    j("MS", "Mississippi"),
    j("MO", "Missouri"),
    j("MT", "Montana"),
    j("NE", "Nebraska"),
    j("NV", "Nevada"),
    j("NH", "New Hampshire"),
    j("NJ", "New Jersey"),
    j("NM", "New Mexico"),
    j("NY", "New York"),
    j("YC", "New York City"),
    j("NC", "North Carolina"),
    j("ND", "North Dakota"),
    j("MP", "Northern Mariana Islands"),
    j("OH", "Ohio"),
    j("OK", "Oklahoma"),
    j("OR", "Oregon"),
    j("PA", "Pennsylvania"),
    j("PR", "Puerto Rico"),
    j("RI", "Rhode Island"),
    j("SC", "South Carolina"),
    j("SD", "South Dakota"),
    j("TN", "Tennessee"),
    j("TX", "Texas"),
    j("UT", "Utah"),
    j("VT", "Vermont"),
    j("VI", "Virgin Islands"),
    j("VA", "Virginia"),
    j("WA", "Washington"),
    j("WV", "West Virginia"),
    j("WI", "Wisconsin"),
    j("WY", "Wyoming"),
];

/// Look up a jurisdiction by its two-letter code (case-insensitive).
pub fn find_jurisdiction(code: &str) -> Option<&'static Jurisdiction> {
    let code = code.trim();
    JURISDICTIONS
        .iter()
        .find(|jurisdiction| jurisdiction.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<&str> = JURISDICTIONS.iter().map(|j| j.code).collect();
        assert_eq!(codes.len(), JURISDICTIONS.len());
    }

    #[test]
    fn find_is_case_insensitive() {
        assert_eq!(find_jurisdiction(" ma ").map(|j| j.name), Some("Massachusetts"));
        assert_eq!(find_jurisdiction("YC").map(|j| j.name), Some("New York City"));
        assert_eq!(find_jurisdiction("ZZ"), None);
    }
}
