//! Append-only history log, one line per background tester run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Format one audit line: `2026-08-22T12:34:56Z pass`.
pub fn history_line(at: DateTime<Utc>, passed: bool) -> String {
    format!(
        "{} {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        if passed { "pass" } else { "fail" }
    )
}

/// Append a line to the log, creating the file if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open history {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("append history {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_format_is_timestamp_then_verdict() {
        let at = Utc.with_ymd_and_hms(2026, 8, 22, 12, 34, 56).unwrap();
        assert_eq!(history_line(at, true), "2026-08-22T12:34:56Z pass");
        assert_eq!(history_line(at, false), "2026-08-22T12:34:56Z fail");
    }

    #[test]
    fn append_only_accumulates_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.log");

        append_line(&path, "first pass").expect("append");
        append_line(&path, "second fail").expect("append");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "first pass\nsecond fail\n");
    }
}
