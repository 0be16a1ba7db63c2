//! Decision gate between rounds: colored round summaries and operator input.

use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::core::menu::{GateChoice, LogChoice, parse_gate_choice, parse_log_choice};
use crate::core::round::{RoundSummary, StageStatus};

pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const DIM: &str = "\x1b[2m";
pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const RED: &str = "\x1b[31m";
pub(crate) const YELLOW: &str = "\x1b[33m";
pub(crate) const GRAY: &str = "\x1b[90m";
pub(crate) const RESET: &str = "\x1b[0m";

/// Operator-facing side of the round loop.
///
/// `choose` runs between rounds. `close` renders the final summary once the
/// round cap is reached; the menu must not appear there.
pub trait DecisionGate {
    fn choose(&mut self, summary: &RoundSummary, next_actions: &str) -> Result<GateChoice>;
    /// One entry of the log-view sub-menu; `None` returns to the gate.
    fn choose_log(&mut self) -> Result<Option<LogChoice>>;
    fn show_document(&mut self, choice: LogChoice, contents: &str) -> Result<()>;
    fn close(&mut self, summary: &RoundSummary) -> Result<()>;
}

/// Gate that renders to the terminal and reads choices from stdin.
///
/// On EOF the gate falls back to the default choice, so a detached run walks
/// through all rounds without stalling.
pub struct TerminalGate;

impl TerminalGate {
    fn read_input(&self) -> Result<String> {
        let mut input = String::new();
        io::stdin().read_line(&mut input).context("read stdin")?;
        Ok(input)
    }
}

impl DecisionGate for TerminalGate {
    fn choose(&mut self, summary: &RoundSummary, next_actions: &str) -> Result<GateChoice> {
        println!("{}", render_summary(summary));
        let preview = preview_lines(next_actions, 6);
        if !preview.is_empty() {
            println!("  {DIM}next actions:{RESET}");
            for line in preview {
                println!("  {DIM}{line}{RESET}");
            }
        }
        print!("\n  [c] continue  [v] view logs  [s] stop\n  > ");
        let _ = io::stdout().flush();
        let input = self.read_input()?;
        Ok(parse_gate_choice(&input))
    }

    fn choose_log(&mut self) -> Result<Option<LogChoice>> {
        print!("\n  logs:");
        for (index, choice) in LogChoice::ALL.iter().enumerate() {
            print!("  [{}] {}", index + 1, choice.label());
        }
        print!("  (other: back)\n  > ");
        let _ = io::stdout().flush();
        let input = self.read_input()?;
        Ok(parse_log_choice(&input))
    }

    fn show_document(&mut self, choice: LogChoice, contents: &str) -> Result<()> {
        println!("\n{BOLD}── {} ──{RESET}", choice.label());
        if contents.trim().is_empty() {
            println!("{GRAY}(empty){RESET}");
        } else {
            println!("{}", contents.trim_end());
        }
        Ok(())
    }

    fn close(&mut self, summary: &RoundSummary) -> Result<()> {
        println!("{}", render_summary(summary));
        println!(
            "{BOLD}round limit reached{RESET} after {} rounds; run `crew run` again to continue",
            summary.max_rounds
        );
        Ok(())
    }
}

fn render_summary(summary: &RoundSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{BOLD}── round {}/{} ──{RESET}\n",
        summary.round, summary.max_rounds
    ));
    out.push_str(&format!("  build   {}\n", stage_cell(summary.build)));
    out.push_str(&format!("  test    {}\n", stage_cell(summary.test)));
    out.push_str(&format!("  deploy  {}\n", stage_cell(summary.deploy)));
    out.push_str(&format!(
        "  bugs    {}, {}\n",
        count_cell(summary.open_critical, "critical", RED),
        count_cell(summary.open_high, "high", YELLOW)
    ));
    if summary.ready {
        out.push_str(&format!("  ready   {GREEN}yes{RESET}\n"));
    } else {
        out.push_str(&format!("  ready   {RED}no{RESET}\n"));
    }
    if !summary.newly_deferred_high.is_empty() {
        out.push_str(&format!(
            "  {YELLOW}deferred high:{RESET} {}\n",
            summary.newly_deferred_high.join(", ")
        ));
    }
    if !summary.blocking_high.is_empty() {
        out.push_str(&format!(
            "  {RED}BLOCKING high:{RESET} {} (deferred at an earlier gate, still open)\n",
            summary.blocking_high.join(", ")
        ));
    }
    out.trim_end().to_string()
}

fn stage_cell(status: StageStatus) -> String {
    match status {
        StageStatus::Ok => format!("{GREEN}\u{2713} ok{RESET}"),
        StageStatus::Failed => format!("{RED}\u{2717} failed{RESET}"),
        StageStatus::Skipped => format!("{GRAY}\u{2298} skipped{RESET}"),
    }
}

fn count_cell(count: usize, label: &str, color: &str) -> String {
    if count > 0 {
        format!("{color}{count} {label} open{RESET}")
    } else {
        format!("0 {label} open")
    }
}

fn preview_lines(contents: &str, max: usize) -> Vec<&str> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(max)
        .collect()
}
