//! Ordered bug severities and their display markers.

use serde::{Deserialize, Serialize};

/// Bug severity, ordered from most to least severe.
///
/// `Critical` always blocks deployment readiness. `High` is surfaced at the
/// round decision gate and may be deferred once. `Medium` and `Low` are only
/// shown by the on-demand reporting path (`crew status`, `crew bugs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Display marker rendered in gate summaries and bug listings.
    ///
    /// These tags are presentation only; classification always goes through
    /// the typed enum, never through scanning prose for the marker text.
    pub fn marker(self) -> &'static str {
        match self {
            Severity::Critical => "\u{1f534} CRITICAL",
            Severity::High => "\u{1f7e0} HIGH",
            Severity::Medium => "\u{1f7e1} MEDIUM",
            Severity::Low => "\u{1f7e2} LOW",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_order_most_severe_first() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
    }

    #[test]
    fn markers_carry_severity_words() {
        assert!(Severity::Critical.marker().contains("CRITICAL"));
        assert!(Severity::High.marker().contains("HIGH"));
        assert!(Severity::Medium.marker().contains("MEDIUM"));
        assert!(Severity::Low.marker().contains("LOW"));
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).expect("serialize");
        assert_eq!(json, "\"critical\"");
        let back: Severity = serde_json::from_str("\"high\"").expect("parse");
        assert_eq!(back, Severity::High);
    }
}
