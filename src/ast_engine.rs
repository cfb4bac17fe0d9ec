//! AST Engine - 文件聚合与扫描入口
//!
//! 🛰️ 扫描流程:
//! 1. 解析目标 (单个 .py 文件或目录)
//! 2. 并行解析每个文件并遍历语法树 (rayon + thread_local Parser)
//! 3. 单文件失败转换为一条 Info finding，不中断整体扫描
//! 4. 与 Bandit 结果合并为 Report
//!
//! Output order never depends on scheduling: files are sorted by path and
//! per-file results are collected back in that order.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bandit::{BanditConfig, BanditRunner};
use crate::error::{ScanError, ScanIssue};
use crate::report::Report;
use crate::scanner::tree_sitter_python::PythonParser;
use crate::scanner::walker::walk;
use crate::scanner::{Catalogue, Finding, SourceParser};

/// Scan switches and collaborator configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Run the external linter (Bandit)
    pub use_external: bool,
    /// Run the built-in AST detectors
    pub use_ast: bool,
    pub bandit: BanditConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            use_external: true,
            use_ast: true,
            bandit: BanditConfig::default(),
        }
    }
}

// ============================================================================
// 目标解析
// ============================================================================

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Resolve a target into the ordered list of source files to analyse.
///
/// A `.py` file yields itself; a directory yields every `.py` file below it,
/// sorted by path. Anything else is a hard error.
pub fn resolve_target(target: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let ext = PythonParser.supported_extension();

    if target.is_file() {
        return if has_extension(target, ext) {
            Ok(vec![target.to_path_buf()])
        } else {
            Err(ScanError::UnsupportedTarget(target.to_path_buf()))
        };
    }

    if target.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(target)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| has_extension(p, ext))
            .collect();
        files.sort();
        return Ok(files);
    }

    if target.exists() {
        Err(ScanError::UnsupportedTarget(target.to_path_buf()))
    } else {
        Err(ScanError::TargetNotFound(target.to_path_buf()))
    }
}

// ============================================================================
// 单文件分析
// ============================================================================

/// Parse and walk in-memory source; findings carry no file tag.
pub fn analyze_source(code: &str, catalogue: &Catalogue) -> Result<Vec<Finding>, ScanIssue> {
    let tree = PythonParser.parse(code)?;
    Ok(walk(&tree, catalogue))
}

/// Analyse one file, tagging every finding with its path.
pub fn scan_file(path: &Path, catalogue: &Catalogue) -> Result<Vec<Finding>, ScanIssue> {
    let content = std::fs::read_to_string(path)?;
    let mut findings = analyze_source(&content, catalogue)?;
    for finding in &mut findings {
        finding.file = Some(path.to_path_buf());
    }
    Ok(findings)
}

/// Analyse files in parallel. Per-file failures become one Info finding each;
/// the result is in input order.
pub fn scan_files(files: &[PathBuf], catalogue: &Catalogue) -> Vec<Finding> {
    let per_file: Vec<Vec<Finding>> = files
        .par_iter()
        .map(|path| match scan_file(path, catalogue) {
            Ok(findings) => {
                debug!(file = %path.display(), count = findings.len(), "file scanned");
                findings
            }
            Err(issue) => {
                warn!(file = %path.display(), error = %issue, "file could not be analysed");
                vec![issue.into_finding(path)]
            }
        })
        .collect();

    per_file.into_iter().flatten().collect()
}

/// Resolve `target` and run the AST detectors over it.
pub fn scan_target(target: &Path, catalogue: &Catalogue) -> Result<Vec<Finding>, ScanError> {
    let files = resolve_target(target)?;
    info!(files = files.len(), rules = catalogue.len(), "AST scan started");
    Ok(scan_files(&files, catalogue))
}

// ============================================================================
// 扫描入口
// ============================================================================

/// Full scan with default collaborator configuration.
pub fn scan(target: &Path, use_external: bool, use_ast: bool) -> Result<Report, ScanError> {
    scan_with_options(
        target,
        &ScanOptions {
            use_external,
            use_ast,
            ..ScanOptions::default()
        },
    )
}

/// Full scan: Bandit and the AST detectors run concurrently and are merged
/// into one report. Only target resolution can fail.
pub fn scan_with_options(target: &Path, options: &ScanOptions) -> Result<Report, ScanError> {
    let files = resolve_target(target)?;

    if !options.use_external {
        info!("Bandit: OFF");
    }
    if !options.use_ast {
        info!("AST: OFF");
    }

    let (external_findings, ast_findings) = rayon::join(
        || {
            if options.use_external {
                BanditRunner::new(options.bandit.clone()).collect_findings(target)
            } else {
                Vec::new()
            }
        },
        || {
            if options.use_ast {
                let catalogue = Catalogue::standard();
                info!(files = files.len(), rules = catalogue.len(), "AST scan started");
                scan_files(&files, &catalogue)
            } else {
                Vec::new()
            }
        },
    );

    info!(
        external = external_findings.len(),
        ast = ast_findings.len(),
        "scan complete"
    );
    Ok(Report::merge(external_findings, ast_findings))
}
