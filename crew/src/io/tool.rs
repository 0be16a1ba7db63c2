//! Phase runner abstraction for tool session invocation.
//!
//! The [`PhaseRunner`] trait decouples round orchestration from the actual
//! coding-assistant backend (any CLI that reads a prompt on stdin). Tests use
//! scripted runners that write predetermined reports without spawning
//! processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{PhaseReport, Role, TesterReport};
use crate::io::process::{CommandOutput, run_command};

/// Parameters for one role session.
#[derive(Debug, Clone)]
pub struct PhaseRequest {
    /// Working directory for the tool process (the repository root).
    pub workdir: PathBuf,
    /// Role the session is acting as; the report must claim the same role.
    pub role: Role,
    /// Rendered prompt fed to the tool over stdin.
    pub prompt: String,
    /// Tool command line, e.g. `["claude", "--print"]`.
    pub command: Vec<String>,
    /// Path to the JSON Schema that constrains the session report.
    pub report_schema_path: PathBuf,
    /// Path where the session must write its report JSON.
    pub report_path: PathBuf,
    /// Path to write the captured session stdout/stderr.
    pub session_log_path: PathBuf,
    /// Maximum session duration; `None` lets the session run unbounded.
    pub timeout: Option<Duration>,
    /// Truncate session output logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over tool session backends.
pub trait PhaseRunner {
    /// Run one session. Must leave the report at `request.report_path`.
    fn run(&self, request: &PhaseRequest) -> Result<()>;
}

/// Runner that spawns the configured tool command.
pub struct ToolPhaseRunner;

impl PhaseRunner for ToolPhaseRunner {
    #[instrument(skip_all, fields(role = request.role.as_str(), timeout_secs = ?request.timeout.map(|t| t.as_secs())))]
    fn run(&self, request: &PhaseRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting tool session");

        if !request.report_schema_path.exists() {
            return Err(anyhow!(
                "missing report schema {}",
                request.report_schema_path.display()
            ));
        }
        if let Some(parent) = request.report_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create report dir {}", parent.display()))?;
        }
        let (program, args) = request
            .command
            .split_first()
            .ok_or_else(|| anyhow!("tool command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&request.workdir)
            // Wrapper scripts read these to locate the report contract.
            .env("CREW_REPORT_PATH", &request.report_path)
            .env("CREW_REPORT_SCHEMA", &request.report_schema_path);

        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run tool session '{program}'"))?;

        write_session_log(&request.session_log_path, &output, request.output_limit_bytes)?;

        if output.timed_out {
            let secs = request.timeout.map(|t| t.as_secs()).unwrap_or(0);
            warn!(timeout_secs = secs, "tool session timed out");
            return Err(anyhow!("tool session timed out after {secs}s"));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "tool session failed");
            return Err(anyhow!(
                "tool session failed with status {:?}",
                output.status.code()
            ));
        }

        debug!("tool session completed successfully");
        Ok(())
    }
}

/// Run the session and load its validated report.
#[instrument(skip_all, fields(report_path = %request.report_path.display()))]
pub fn run_and_load_report<R: PhaseRunner>(
    runner: &R,
    request: &PhaseRequest,
) -> Result<PhaseReport> {
    let report: PhaseReport = run_and_load_json(runner, request)?;
    check_role(report.role, request.role)?;
    debug!(outcome = ?report.outcome, "parsed phase report");
    Ok(report)
}

/// Run a Tester session and load its validated report.
#[instrument(skip_all, fields(report_path = %request.report_path.display()))]
pub fn run_and_load_tester_report<R: PhaseRunner>(
    runner: &R,
    request: &PhaseRequest,
) -> Result<TesterReport> {
    let report: TesterReport = run_and_load_json(runner, request)?;
    check_role(report.role, request.role)?;
    debug!(
        passed = report.passed,
        bugs = report.bugs.len(),
        fixed = report.fixed_bug_ids.len(),
        "parsed tester report"
    );
    Ok(report)
}

fn run_and_load_json<R: PhaseRunner, T: DeserializeOwned>(
    runner: &R,
    request: &PhaseRequest,
) -> Result<T> {
    runner.run(request)?;
    if !request.report_path.exists() {
        return Err(anyhow!(
            "missing session report {}",
            request.report_path.display()
        ));
    }
    let contents = fs::read_to_string(&request.report_path)
        .with_context(|| format!("read session report {}", request.report_path.display()))?;
    let instance: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", request.report_path.display()))?;

    let schema_raw = fs::read_to_string(&request.report_schema_path)
        .with_context(|| format!("read report schema {}", request.report_schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_raw)
        .with_context(|| format!("parse {}", request.report_schema_path.display()))?;
    validate_schema(&instance, &schema)?;

    let parsed = serde_json::from_value(instance)
        .with_context(|| format!("parse {}", request.report_path.display()))?;
    Ok(parsed)
}

fn check_role(reported: Role, expected: Role) -> Result<()> {
    if reported != expected {
        return Err(anyhow!(
            "report role mismatch: expected {}, got {}",
            expected.as_str(),
            reported.as_str()
        ));
    }
    Ok(())
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

fn write_session_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create session log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("session"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("session"));
    if output.timed_out {
        buf.push_str("\n[session timed out]\n");
    }

    if buf.len() > output_limit {
        let truncated = format!(
            "{}\n[truncated {} bytes]\n",
            &buf[..output_limit],
            buf.len() - output_limit
        );
        fs::write(path, truncated)
            .with_context(|| format!("write session log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write session log {}", path.display()))
}
