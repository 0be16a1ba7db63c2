//! Prompt pack builder for deterministic phase input.
//!
//! Each role has a Markdown template with sections marked by HTML comments.
//! Rendered sections are kept within a byte budget by dropping shared context
//! before the role's primary input.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::bugs::render_bug_lines;
use crate::core::severity::Severity;
use crate::core::types::{Document, Role};
use crate::io::store::Store;

const ARCHITECT_TEMPLATE: &str = include_str!("prompts/architect.md");
const BUILDER_TEMPLATE: &str = include_str!("prompts/builder.md");
const TESTER_TEMPLATE: &str = include_str!("prompts/tester.md");
const DEPLOYER_TEMPLATE: &str = include_str!("prompts/deployer.md");
const BUGFIXER_TEMPLATE: &str = include_str!("prompts/bugfixer.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("architect", ARCHITECT_TEMPLATE)
            .expect("architect template should be valid");
        env.add_template("builder", BUILDER_TEMPLATE)
            .expect("builder template should be valid");
        env.add_template("tester", TESTER_TEMPLATE)
            .expect("tester template should be valid");
        env.add_template("deployer", DEPLOYER_TEMPLATE)
            .expect("deployer template should be valid");
        env.add_template("bugfixer", BUGFIXER_TEMPLATE)
            .expect("bugfixer template should be valid");
        Self { env }
    }

    fn render(&self, input: &PromptInputs) -> Result<String> {
        let template = self.env.get_template(input.role.as_str())?;
        let rendered = template.render(context! {
            report_path => input.report_path.as_str(),
            schema_path => input.schema_path.as_str(),
            architecture => present(&input.architecture),
            next_actions => present(&input.next_actions),
            build_log => present(&input.build_log),
            test_report => present(&input.test_report),
            deployment_log => present(&input.deployment_log),
            known_bugs => present(&input.known_bugs),
            critical_bugs => present(&input.critical_bugs),
        })?;
        Ok(rendered)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "build_log").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Full section content including header.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
///
/// Markers follow format: `<!-- section:KEY required|droppable -->`
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    use std::sync::LazyLock;
    static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").unwrap()
    });

    let mut sections = Vec::new();
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in matches.iter().enumerate() {
        let key = caps.get(1).unwrap().as_str().to_string();
        let required = caps.get(2).unwrap().as_str() == "required";
        let start = caps.get(0).unwrap().end();
        let end = matches
            .get(i + 1)
            .map(|m| m.get(0).unwrap().start())
            .unwrap_or(rendered.len());

        // Content after marker, excluding the marker itself
        let content = rendered[start..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key,
                required,
                content,
            });
        }
    }

    sections
}

/// Apply budget to parsed sections, dropping droppable sections as needed.
///
/// Drop order: deployment_log -> next_actions -> architecture -> known_bugs
/// -> build_log -> test_report
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    let drop_order = [
        "deployment_log",
        "next_actions",
        "architecture",
        "known_bugs",
        "build_log",
        "test_report",
    ];
    for key in drop_order {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped_len = sections[idx].content.len();
            debug!(
                section = key,
                bytes_dropped = dropped_len,
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    // If still over budget, truncate the last section
    if total_len(sections) > budget && !sections.is_empty() {
        let other_len: usize = sections
            .iter()
            .take(sections.len() - 1)
            .map(|s| s.content.len())
            .sum();
        let allowed = budget.saturating_sub(other_len);
        let last = sections.last_mut().unwrap();
        let before_len = last.content.len();
        if last.content.len() > allowed {
            if allowed > 12 {
                last.content.truncate(allowed - 12);
                last.content.push_str("\n[truncated]");
            } else {
                last.content.truncate(allowed);
            }
            debug!(
                section = last.key,
                before_len,
                after_len = last.content.len(),
                "truncated section for budget"
            );
        }
    }
}

/// Render sections back to a single string.
fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// All inputs needed to build a role prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub role: Role,
    /// Where the session must write its JSON report.
    pub report_path: String,
    /// Schema the report must conform to.
    pub schema_path: String,
    pub architecture: Option<String>,
    pub next_actions: Option<String>,
    pub build_log: Option<String>,
    pub test_report: Option<String>,
    pub deployment_log: Option<String>,
    /// Rendered list of unresolved ledger entries.
    pub known_bugs: Option<String>,
    /// Rendered list of unresolved critical ledger entries.
    pub critical_bugs: Option<String>,
}

impl PromptInputs {
    /// Load prompt inputs from the coordination store.
    pub fn from_store(
        store: &Store,
        role: Role,
        report_path: String,
        schema_path: String,
    ) -> Result<Self> {
        let ledger = store.load_bugs()?;
        let known = render_bug_lines(ledger.unfixed());
        let critical =
            render_bug_lines(ledger.unfixed().filter(|b| b.severity == Severity::Critical));

        Ok(Self {
            role,
            report_path,
            schema_path,
            architecture: store.read_document_opt(Document::Architecture)?,
            next_actions: store.read_document_opt(Document::NextActions)?,
            build_log: store.read_document_opt(Document::BuildLog)?,
            test_report: store.read_document_opt(Document::TestReport)?,
            deployment_log: store.read_document_opt(Document::DeploymentLog)?,
            known_bugs: (!known.is_empty()).then_some(known),
            critical_bugs: (!critical.is_empty()).then_some(critical),
        })
    }
}

/// Builds a prompt pack within a byte budget, dropping less critical sections first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Build the prompt pack for the role named in `input`.
    pub fn build(&self, input: &PromptInputs) -> PromptPack {
        let engine = PromptEngine::new();
        let rendered = engine
            .render(input)
            .expect("role template rendering should not fail");

        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);

        PromptPack {
            content: render_sections(&sections),
        }
    }
}

/// A rendered prompt ready to feed to the tool session over stdin.
#[derive(Debug, Clone)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    /// Get the rendered prompt content.
    pub fn render(&self) -> String {
        self.content.clone()
    }
}
