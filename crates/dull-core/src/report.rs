use std::{fmt::Write, str::FromStr};

use serde::Deserialize;

use crate::lint::LintResult;

/// Output styles for a [`LintResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "human" | "text" => Ok(Self::Human),
            other => Err(format!(
                "unknown output format `{other}` (expected json, yaml or human)"
            )),
        }
    }
}

/// Produce the printable form of a lint result.
pub fn render_result(result: &LintResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(result)?),
        OutputFormat::Human => render_human(result),
    }
}

/// Shape advertised in the bundled response schema.
#[derive(Debug, Deserialize)]
struct ViolationReport {
    strategic_violations: Vec<RuleViolations>,
}

#[derive(Debug, Deserialize)]
struct RuleViolations {
    rule_code: String,
    #[serde(default)]
    brief_description: String,
    #[serde(default)]
    suggested_alternative: Option<String>,
    #[serde(default)]
    violations: Vec<Violation>,
}

#[derive(Debug, Deserialize)]
struct Violation {
    file_path: String,
    #[serde(default)]
    line_range: Option<String>,
    #[serde(default)]
    code_snippet: Option<String>,
    explanation: String,
    #[serde(default)]
    suggestion: Option<String>,
}

fn render_human(result: &LintResult) -> anyhow::Result<String> {
    let report = match result {
        LintResult::Report(value) => ViolationReport::deserialize(value).ok(),
        LintResult::ParseFailure { .. } => None,
    };
    let Some(report) = report else {
        return Ok(serde_json::to_string_pretty(result)?);
    };

    let mut out = String::new();
    if report.strategic_violations.is_empty() {
        writeln!(out, "No strategic violations detected.")?;
        return Ok(out);
    }

    let total: usize = report
        .strategic_violations
        .iter()
        .map(|rule| rule.violations.len())
        .sum();
    writeln!(
        out,
        "{total} violation(s) across {} rule(s)",
        report.strategic_violations.len()
    )?;

    for rule in &report.strategic_violations {
        writeln!(out)?;
        writeln!(out, "{} {}", rule.rule_code, rule.brief_description)?;
        for violation in &rule.violations {
            let location = match violation.line_range.as_deref() {
                Some(lines) if !lines.trim().is_empty() => {
                    format!("{}:{}", violation.file_path, lines.trim())
                }
                _ => violation.file_path.clone(),
            };
            writeln!(out, "  - {location} :: {}", violation.explanation)?;
            if let Some(snippet) = violation
                .code_snippet
                .as_deref()
                .filter(|s| !s.trim().is_empty())
            {
                writeln!(out, "    `{}`", single_line(snippet))?;
            }
            if let Some(suggestion) = violation.suggestion.as_deref() {
                writeln!(out, "    fix: {suggestion}")?;
            }
        }
        if let Some(alternative) = rule.suggested_alternative.as_deref() {
            writeln!(out, "  suggested alternative: {alternative}")?;
        }
    }
    Ok(out)
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}
