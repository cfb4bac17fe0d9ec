//! 扫描核心 (Detector Engine)
//!
//! - `syntax`: closed node model the detectors match on
//! - `tree_sitter_python`: Python front end (tree-sitter -> `syntax`)
//! - `rule_handlers`: the `Detector` trait and every concrete rule
//! - `walker`: pre-order traversal applying the catalogue to each node

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod rule_handlers;
pub mod syntax;
pub mod tree_sitter_python;
pub mod walker;

use crate::error::ParseError;
use rule_handlers::Detector;
use syntax::SyntaxTree;

/// 问题严重级别 (High first when sorted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }

    /// Map an external severity label; unknown labels become `Info`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Severity::Info)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Source line of a finding; `Unknown` for file-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineRef {
    Line(usize),
    Unknown,
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Line(n) => write!(f, "{n}"),
            LineRef::Unknown => f.write_str("N/A"),
        }
    }
}

impl Serialize for LineRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LineRef::Line(n) => serializer.serialize_u64(*n as u64),
            LineRef::Unknown => serializer.serialize_str("N/A"),
        }
    }
}

/// One reported issue.
///
/// `file` is absent while detectors run and is attached once by the file
/// aggregator (or supplied by the external linter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub line: LineRef,
    pub file: Option<PathBuf>,
}

impl Finding {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>, line: LineRef) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            line,
            file: None,
        }
    }
}

/// Parser seam between the engine and a language front end.
pub trait SourceParser: Send + Sync {
    /// File extension handled by this parser, without the dot
    fn supported_extension(&self) -> &str;

    fn parse(&self, code: &str) -> Result<SyntaxTree, ParseError>;
}

// ============================================================================
// Detector Catalogue
// ============================================================================

/// Ordered, immutable set of detectors. Built once per scan and shared by
/// reference across worker threads.
pub struct Catalogue {
    detectors: Vec<Box<dyn Detector>>,
}

impl Catalogue {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// The built-in Python rule set, in evaluation order.
    pub fn standard() -> Self {
        Self::new(rule_handlers::standard_detectors())
    }

    pub fn detectors(&self) -> &[Box<dyn Detector>] {
        &self.detectors
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalogue").field("detectors", &self.ids()).finish()
    }
}
