//! Report exporter
//!
//! Writes `report_<timestamp>.json` or `.html` into the output directory
//! (default `logged/`).

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::report::Report;
use crate::scanner::Finding;

pub const DEFAULT_OUTPUT_DIR: &str = "logged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        }
    }
}

/// `report_2024-05-01_12-30-00.json`
pub fn report_file_name(report: &Report, format: OutputFormat) -> String {
    format!(
        "report_{}.{}",
        report.generated_at().format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    )
}

/// Serialize `report` into `dir`, creating it if needed. Returns the written path.
pub fn write_report(report: &Report, format: OutputFormat, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(report_file_name(report, format));
    let body = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Html => render_html(report),
    };
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), "report exported");
    Ok(path)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_item(html: &mut String, finding: &Finding) {
    let file = finding
        .file
        .as_ref()
        .map(|f| format!(" – {}", escape_html(&f.display().to_string())))
        .unwrap_or_default();
    let _ = writeln!(
        html,
        "<li><b>{}</b> – {} – line {}{}<br>{}</li>",
        escape_html(&finding.rule),
        finding.severity,
        finding.line,
        file,
        escape_html(&finding.message)
    );
}

pub fn render_html(report: &Report) -> String {
    let mut html = String::from("<html><head><meta charset=\"utf-8\"><title>Scan report</title></head><body>\n");
    html.push_str("<h1>Scan results</h1>\n");
    let _ = writeln!(
        html,
        "<p>Generated: {}</p>",
        report.generated_at().format("%Y-%m-%d %H:%M:%S")
    );

    for (title, findings) in [
        ("External linter (Bandit)", report.external_findings()),
        ("AST rules", report.ast_findings()),
    ] {
        let _ = writeln!(html, "<h2>{title}</h2>\n<ul>");
        for finding in findings {
            render_item(&mut html, finding);
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{LineRef, Severity};
    use chrono::{Local, TimeZone};

    fn sample_report() -> Report {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let mut ast = Finding::new(
            "SQL_INJECTION",
            Severity::High,
            "cursor.execute() with <dynamic> SQL",
            LineRef::Line(7),
        );
        ast.file = Some(PathBuf::from("db.py"));
        Report::merge_at(at, Vec::new(), vec![ast])
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(&sample_report(), OutputFormat::Html),
            "report_2024-05-01_12-30-00.html"
        );
    }

    #[test]
    fn test_html_item_is_escaped() {
        let html = render_html(&sample_report());
        insta::assert_snapshot!(
            html.lines().find(|l| l.starts_with("<li>")).unwrap(),
            @"<li><b>SQL_INJECTION</b> – High – line 7 – db.py<br>cursor.execute() with &lt;dynamic&gt; SQL</li>"
        );
        assert!(html.contains("<h2>External linter (Bandit)</h2>"));
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("logged");
        let path = write_report(&sample_report(), OutputFormat::Json, &out).unwrap();

        assert_eq!(path, out.join("report_2024-05-01_12-30-00.json"));
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["ast_findings"][0]["line"], 7);
        assert_eq!(value["ast_findings"][0]["file"], "db.py");
    }
}
