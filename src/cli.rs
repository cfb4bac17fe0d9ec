//! CLI 模式处理器
//!
//! 默认输出人类可读格式，使用 --json 输出 `{ success, data }` 包装的 JSON

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::ast_engine::{self, ScanOptions};
use crate::bandit::{BanditConfig, BanditRunner};
use crate::export::{self, OutputFormat, DEFAULT_OUTPUT_DIR};
use crate::report::Report;
use crate::rules;
use crate::scanner::{Finding, Severity};

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 🛰️ 扫描 Python 文件或目录
    Scan {
        /// 目标路径 (.py 文件或目录)
        #[arg(default_value = ".")]
        target: PathBuf,

        /// 报告格式
        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,

        /// 不运行 Bandit
        #[arg(long)]
        no_bandit: bool,

        /// 不运行内置 AST 规则
        #[arg(long)]
        no_ast: bool,

        /// 报告输出目录
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// bandit 可执行文件
        #[arg(long, default_value = "bandit")]
        bandit_bin: String,
    },

    /// ⚠️ 列出所有规则
    Rules,

    /// ℹ️ 引擎状态
    Status,
}

/// 处理 CLI 命令
///
/// json_output: 是否输出 JSON 格式（默认 false，输出人类可读格式）
pub fn handle_command(cmd: Command, json_output: bool) -> Result<()> {
    let result = match cmd {
        Command::Scan {
            target,
            output,
            no_bandit,
            no_ast,
            output_dir,
            bandit_bin,
        } => {
            let options = ScanOptions {
                use_external: !no_bandit,
                use_ast: !no_ast,
                bandit: BanditConfig {
                    executable: bandit_bin,
                    ..BanditConfig::default()
                },
            };
            run_scan(&target, &options, output, &output_dir, json_output)
        }

        Command::Rules => Ok(list_rules(json_output)),

        Command::Status => Ok(status(json_output)),
    };

    match result {
        Ok(value) => {
            if json_output {
                let output = json!({
                    "success": true,
                    "data": value
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_value(&value);
            }
        }
        Err(e) => {
            if json_output {
                let output = json!({
                    "success": false,
                    "error": e.to_string()
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("❌ {e:#}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 打印 Value，字符串直接输出
fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{s}"),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

// ============================================================================
// scan
// ============================================================================

fn run_scan(
    target: &Path,
    options: &ScanOptions,
    format: OutputFormat,
    output_dir: &Path,
    json_output: bool,
) -> Result<Value> {
    let report = ast_engine::scan_with_options(target, options)?;
    let path = export::write_report(&report, format, output_dir)?;

    if json_output {
        Ok(json!({
            "report_path": path,
            "report": report,
        }))
    } else {
        Ok(json!(render_summary(&report, &path)))
    }
}

fn render_finding(out: &mut String, finding: &Finding) {
    let file = finding
        .file
        .as_ref()
        .map(|f| format!("{}:", f.display()))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "  [{}] {} {}{} {}",
        finding.severity, finding.rule, file, finding.line, finding.message
    );
}

fn render_summary(report: &Report, path: &Path) -> String {
    let mut out = String::new();

    for (title, findings) in [
        ("External linter (Bandit)", report.external_findings()),
        ("AST rules", report.ast_findings()),
    ] {
        let _ = writeln!(out, "== {title}: {} finding(s)", findings.len());
        for finding in findings {
            render_finding(&mut out, finding);
        }
    }

    let _ = writeln!(
        out,
        "----------------------------------------\nHigh: {} | Medium: {} | Low: {} | Info: {}\nReport saved to {}",
        report.count_by_severity(Severity::High),
        report.count_by_severity(Severity::Medium),
        report.count_by_severity(Severity::Low),
        report.count_by_severity(Severity::Info),
        path.display()
    );
    out
}

// ============================================================================
// rules / status
// ============================================================================

fn list_rules(json_output: bool) -> Value {
    let registry = rules::registry();

    if json_output {
        return json!({
            "rules": registry.all().collect::<Vec<_>>(),
            "stats": registry.stats(),
        });
    }

    let mut out = String::new();
    for rule in registry.all() {
        let _ = writeln!(
            out,
            "{:<24} {:<7} {:<16} {}",
            rule.id,
            rule.severity,
            rule.category.as_str(),
            rule.description
        );
    }
    json!(out.trim_end())
}

fn status(json_output: bool) -> Value {
    let version = env!("CARGO_PKG_VERSION");
    let stats = rules::registry().stats();
    let bandit = BanditRunner::default().version();

    if json_output {
        json!({
            "version": version,
            "engine": "tree-sitter-python",
            "ast_rules": stats,
            "bandit": bandit,
        })
    } else {
        json!(format!(
            "pyaudit v{}\n\
            Engine: tree-sitter-python AST\n\
            AST Rules: {} (High {} | Medium {} | Low {})\n\
            Bandit: {}",
            version,
            stats.total,
            stats.high_count,
            stats.medium_count,
            stats.low_count,
            bandit.as_deref().unwrap_or("not found")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::LineRef;

    #[test]
    fn test_summary_lists_both_sections() {
        let mut finding = Finding::new("OS_SYSTEM", Severity::Medium, "Use of os.system()", LineRef::Line(3));
        finding.file = Some(PathBuf::from("app.py"));
        let report = Report::merge(Vec::new(), vec![finding]);

        let summary = render_summary(&report, Path::new("logged/report.json"));
        assert!(summary.contains("== External linter (Bandit): 0 finding(s)"));
        assert!(summary.contains("  [Medium] OS_SYSTEM app.py:3 Use of os.system()"));
        assert!(summary.contains("High: 0 | Medium: 1 | Low: 0 | Info: 0"));
        assert!(summary.ends_with("Report saved to logged/report.json\n"));
    }

    #[test]
    fn test_list_rules_json() {
        let value = list_rules(true);
        assert_eq!(value["rules"].as_array().unwrap().len(), 16);
        assert_eq!(value["rules"][0]["id"], "DANGEROUS_EVAL");
        assert_eq!(value["stats"]["total"], 16);
    }

    #[test]
    fn test_run_scan_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "eval(x)\n").unwrap();
        let out = dir.path().join("logged");

        let options = ScanOptions {
            use_external: false,
            ..ScanOptions::default()
        };
        let value = run_scan(&file, &options, OutputFormat::Html, &out, true).unwrap();

        let path = PathBuf::from(value["report_path"].as_str().unwrap());
        assert!(path.starts_with(&out));
        assert_eq!(path.extension().unwrap(), "html");
        assert_eq!(value["report"]["ast_findings"][0]["rule"], "DANGEROUS_EVAL");
    }

    #[test]
    fn test_run_scan_missing_target_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_scan(
            &dir.path().join("missing"),
            &ScanOptions::default(),
            OutputFormat::Json,
            &dir.path().join("logged"),
            false,
        );
        assert!(result.is_err());
        assert!(!dir.path().join("logged").exists());
    }
}
