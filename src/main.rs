use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pyaudit::cli::{self, Command};

/// Python security anti-pattern scanner
///
/// 内置 AST 规则 + Bandit，默认输出人类可读格式
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 日志过滤 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 输出 JSON 格式
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (stderr，stdout 留给命令输出)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::handle_command(args.command, args.json)
}
