//! Decision-gate menu parsing.

use crate::core::types::Document;

/// Top-level choice at the round decision gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChoice {
    Continue,
    ViewLogs,
    Stop,
}

/// Parse operator input at the decision gate.
///
/// Unrecognized or empty input falls back to `Continue`, the documented
/// default, so a stray keypress never aborts the loop.
pub fn parse_gate_choice(input: &str) -> GateChoice {
    match input.trim().to_ascii_lowercase().as_str() {
        "v" | "view" | "logs" | "view logs" => GateChoice::ViewLogs,
        "s" | "stop" | "q" | "quit" => GateChoice::Stop,
        _ => GateChoice::Continue,
    }
}

/// Entry in the log-view sub-menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChoice {
    Architecture,
    Build,
    Test,
    Deploy,
    Actions,
    History,
}

impl LogChoice {
    pub const ALL: [LogChoice; 6] = [
        LogChoice::Architecture,
        LogChoice::Build,
        LogChoice::Test,
        LogChoice::Deploy,
        LogChoice::Actions,
        LogChoice::History,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LogChoice::Architecture => "architecture",
            LogChoice::Build => "build log",
            LogChoice::Test => "test report",
            LogChoice::Deploy => "deployment log",
            LogChoice::Actions => "next actions",
            LogChoice::History => "history",
        }
    }

    /// The store document behind this entry; `None` for the history log.
    pub fn document(self) -> Option<Document> {
        match self {
            LogChoice::Architecture => Some(Document::Architecture),
            LogChoice::Build => Some(Document::BuildLog),
            LogChoice::Test => Some(Document::TestReport),
            LogChoice::Deploy => Some(Document::DeploymentLog),
            LogChoice::Actions => Some(Document::NextActions),
            LogChoice::History => None,
        }
    }
}

/// Parse operator input in the log-view sub-menu.
///
/// Accepts the 1-based entry number or a name; anything else returns `None`,
/// which callers treat as "back to the gate".
pub fn parse_log_choice(input: &str) -> Option<LogChoice> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "a" | "arch" | "architecture" => Some(LogChoice::Architecture),
        "2" | "b" | "build" => Some(LogChoice::Build),
        "3" | "t" | "test" => Some(LogChoice::Test),
        "4" | "d" | "deploy" | "deployment" => Some(LogChoice::Deploy),
        "5" | "n" | "actions" | "next" => Some(LogChoice::Actions),
        "6" | "h" | "history" => Some(LogChoice::History),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_choices_map_to_documented_actions() {
        assert_eq!(parse_gate_choice("c"), GateChoice::Continue);
        assert_eq!(parse_gate_choice("continue"), GateChoice::Continue);
        assert_eq!(parse_gate_choice(" V "), GateChoice::ViewLogs);
        assert_eq!(parse_gate_choice("view logs"), GateChoice::ViewLogs);
        assert_eq!(parse_gate_choice("s"), GateChoice::Stop);
        assert_eq!(parse_gate_choice("quit"), GateChoice::Stop);
    }

    #[test]
    fn invalid_gate_input_falls_back_to_continue() {
        assert_eq!(parse_gate_choice(""), GateChoice::Continue);
        assert_eq!(parse_gate_choice("\n"), GateChoice::Continue);
        assert_eq!(parse_gate_choice("xyzzy"), GateChoice::Continue);
    }

    #[test]
    fn every_log_entry_is_reachable_by_number_and_name() {
        for (index, choice) in LogChoice::ALL.iter().enumerate() {
            let by_number = parse_log_choice(&(index + 1).to_string());
            assert_eq!(by_number, Some(*choice));
        }
        assert_eq!(parse_log_choice("history"), Some(LogChoice::History));
        assert_eq!(parse_log_choice("build"), Some(LogChoice::Build));
    }

    #[test]
    fn unknown_log_input_means_back() {
        assert_eq!(parse_log_choice(""), None);
        assert_eq!(parse_log_choice("back"), None);
        assert_eq!(parse_log_choice("7"), None);
    }

    #[test]
    fn history_is_the_only_entry_without_a_document() {
        for choice in LogChoice::ALL {
            assert_eq!(choice.document().is_none(), choice == LogChoice::History);
        }
    }
}
