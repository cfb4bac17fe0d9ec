// ============================================================================
// Python Static Security Scanner - Library Interface
// ============================================================================
//
// This module exposes the internal modules for integration testing.
// The main binary (main.rs) uses these modules through this crate.

pub mod ast_engine;
pub mod bandit;
pub mod cli;
pub mod error;
pub mod export;
pub mod report;
pub mod rules;
pub mod scanner;

pub use ast_engine::{scan, scan_with_options, ScanOptions};
pub use error::{ScanError, ScanIssue};
pub use report::Report;
pub use scanner::{Catalogue, Finding, LineRef, Severity};
