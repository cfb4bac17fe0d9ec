//! Bandit executor
//!
//! Runs the external Bandit linter as a subprocess (`bandit -f json`) and
//! normalizes its JSON output into `Finding`s. Every failure mode degrades to
//! an empty list: the AST scan never depends on Bandit being installed.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scanner::{Finding, LineRef, Severity};

#[derive(Debug, Error)]
pub enum BanditError {
    #[error("failed to run {executable}: {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },

    #[error("bandit produced no output (exit code {code:?}): {stderr}")]
    NoOutput { code: Option<i32>, stderr: String },

    #[error("failed to parse bandit output: {0}")]
    OutputParse(#[from] serde_json::Error),
}

/// Configuration for Bandit execution
#[derive(Debug, Clone)]
pub struct BanditConfig {
    /// Path to the bandit executable (or "bandit" if in PATH)
    pub executable: String,
    /// Lowest issue severity Bandit should report
    pub min_severity: Severity,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            executable: "bandit".to_string(),
            min_severity: Severity::Medium,
        }
    }
}

impl BanditConfig {
    /// `-l` / `-ll` / `-lll` report-level flag
    fn level_flag(&self) -> &'static str {
        match self.min_severity {
            Severity::High => "-lll",
            Severity::Medium => "-ll",
            Severity::Low | Severity::Info => "-l",
        }
    }
}

// ============================================================================
// Bandit JSON output
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct BanditOutput {
    #[serde(default)]
    pub results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
pub struct BanditResult {
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub issue_severity: Option<String>,
    #[serde(default)]
    pub issue_text: String,
    #[serde(default)]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub filename: Option<PathBuf>,
}

impl From<BanditResult> for Finding {
    fn from(result: BanditResult) -> Self {
        let rule = result
            .test_name
            .or(result.test_id)
            .unwrap_or_else(|| "N/A".to_string());
        let severity = result
            .issue_severity
            .as_deref()
            .map(Severity::from_label)
            .unwrap_or(Severity::Info);
        let line = result.line_number.map(LineRef::Line).unwrap_or(LineRef::Unknown);

        let mut finding = Finding::new(rule, severity, result.issue_text, line);
        finding.file = result.filename;
        finding
    }
}

/// Parse raw `bandit -f json` stdout.
pub fn parse_output(stdout: &str) -> Result<Vec<Finding>, BanditError> {
    let output: BanditOutput = serde_json::from_str(stdout)?;
    Ok(output.results.into_iter().map(Finding::from).collect())
}

// ============================================================================
// Runner
// ============================================================================

pub struct BanditRunner {
    config: BanditConfig,
}

impl BanditRunner {
    pub fn new(config: BanditConfig) -> Self {
        Self { config }
    }

    /// `bandit --version` first line, or `None` when not installed
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.config.executable)
            .arg("--version")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
    }

    /// Run Bandit against a file or directory.
    pub fn run(&self, target: &Path) -> Result<Vec<Finding>, BanditError> {
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg("-f")
            .arg("json")
            .arg("-q")
            .arg("-r")
            .arg(target)
            .arg(self.config.level_flag());

        debug!(command = ?cmd, "Executing bandit");

        let output = cmd.output().map_err(|source| BanditError::Spawn {
            executable: self.config.executable.clone(),
            source,
        })?;

        // bandit exits with 1 when it found issues; only missing output is a failure
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(BanditError::NoOutput {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_output(&stdout)
    }

    /// Like [`run`](Self::run), but any failure yields an empty list.
    pub fn collect_findings(&self, target: &Path) -> Vec<Finding> {
        match self.run(target) {
            Ok(findings) => {
                info!(count = findings.len(), "bandit finished");
                findings
            }
            Err(e) => {
                warn!(error = %e, "bandit unavailable, continuing without external findings");
                Vec::new()
            }
        }
    }
}

impl Default for BanditRunner {
    fn default() -> Self {
        Self::new(BanditConfig::default())
    }
}
