//! Report model
//!
//! One immutable value per scan: the external linter's findings, the AST
//! findings and the time the scan finished.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::scanner::{Finding, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    generated_at: DateTime<Local>,
    external_findings: Vec<Finding>,
    ast_findings: Vec<Finding>,
}

impl Report {
    /// Package both finding lists, stamping the current time once.
    pub fn merge(external_findings: Vec<Finding>, ast_findings: Vec<Finding>) -> Self {
        Self::merge_at(Local::now(), external_findings, ast_findings)
    }

    pub fn merge_at(
        generated_at: DateTime<Local>,
        external_findings: Vec<Finding>,
        ast_findings: Vec<Finding>,
    ) -> Self {
        Self {
            generated_at,
            external_findings,
            ast_findings,
        }
    }

    pub fn generated_at(&self) -> DateTime<Local> {
        self.generated_at
    }

    pub fn external_findings(&self) -> &[Finding] {
        &self.external_findings
    }

    pub fn ast_findings(&self) -> &[Finding] {
        &self.ast_findings
    }

    /// Both lists, external first
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.external_findings.iter().chain(self.ast_findings.iter())
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.all_findings().filter(|f| f.severity == severity).count()
    }

    pub fn is_empty(&self) -> bool {
        self.external_findings.is_empty() && self.ast_findings.is_empty()
    }
}
