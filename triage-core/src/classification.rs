use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse severity tier assigned to a log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

// First match wins, in this order.
const SEVERITY_MARKERS: &[(&[&str], Severity)] = &[
    (&["EMERGENCY", "CRITICAL"], Severity::Critical),
    (&["ERROR"], Severity::High),
    (&["WARNING"], Severity::Medium),
];

/// Purely lexical, case-insensitive classification.
pub fn classify(entry_text: &str) -> Severity {
    let upper = entry_text.to_uppercase();
    SEVERITY_MARKERS
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| upper.contains(m)))
        .map(|(_, severity)| *severity)
        .unwrap_or(Severity::Low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert_eq!(classify("local.EMERGENCY: disk gone"), Severity::Critical);
        assert_eq!(classify("critical error in worker"), Severity::Critical);
        assert_eq!(classify("ERROR and WARNING together"), Severity::High);
        assert_eq!(classify("Warning: deprecated call"), Severity::Medium);
        assert_eq!(classify("user logged in"), Severity::Low);
    }

    #[test]
    fn test_matches_anywhere_in_multiline_text() {
        assert_eq!(classify("started\nthen an error happened"), Severity::High);
    }

    #[test]
    fn test_lexical_not_semantic() {
        // "WARN" alone is not a marker.
        assert_eq!(classify("WARN cache miss"), Severity::Low);
        assert_eq!(classify("no errors found"), Severity::High);
    }

    #[test]
    fn test_ordering_supports_worst_of() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }
}
