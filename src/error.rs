//! 错误类型
//!
//! - `ScanError`: target resolution failures, the only errors that stop a scan
//! - `ScanIssue`: per-file failures, folded into one Info finding each
//! - `ParseError`: the Python front end could not produce a syntax tree

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scanner::{Finding, LineRef, Severity};

/// Rule id of the synthetic finding for an unparsable file
pub const PARSE_ERROR_RULE: &str = "PARSE_ERROR";
/// Rule id of the synthetic finding for an unreadable file
pub const READ_ERROR_RULE: &str = "READ_ERROR";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Target not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("Target is neither a .py file nor a directory: {}", .0.display())]
    UnsupportedTarget(PathBuf),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid syntax at line {line}, column {column}")]
    Syntax { line: usize, column: usize },

    #[error("too many nesting levels at line {line} (limit {limit})")]
    TooDeep { line: usize, limit: usize },

    #[error("failed to load Python grammar: {0}")]
    Language(String),

    #[error("parser returned no tree")]
    NoTree,
}

#[derive(Debug, Error)]
pub enum ScanIssue {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Read(#[from] std::io::Error),
}

impl ScanIssue {
    /// The single Info finding that stands in for a file that could not be analysed.
    pub fn into_finding(self, file: &Path) -> Finding {
        let (rule, message) = match &self {
            ScanIssue::Parse(e @ (ParseError::Syntax { .. } | ParseError::TooDeep { .. })) => (
                PARSE_ERROR_RULE,
                format!("Could not parse file (syntax error): {e}"),
            ),
            ScanIssue::Parse(e) => (PARSE_ERROR_RULE, format!("Could not scan file: {e}")),
            ScanIssue::Read(e) => (READ_ERROR_RULE, format!("Could not scan file: {e}")),
        };

        let mut finding = Finding::new(rule, Severity::Info, message, LineRef::Unknown);
        finding.file = Some(file.to_path_buf());
        finding
    }
}
