use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use creator_directory::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志系统，RUST_LOG 未设置时为 info
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = cli::Cli::parse();

    println!("{}", "
  ___             _                ___  _            _
 / __|_ _ ___ __ _| |_ ___ _ _    |   \\(_)_ _ ___ __| |_ ___ _ _ _  _
| (__| '_/ -_) _` |  _/ _ \\ '_|   | |) | | '_/ -_) _|  _/ _ \\ '_| || |
 \\___|_| \\___\\__,_|\\__\\___/_|     |___/|_|_| \\___\\__|\\__\\___/_|  \\_, |
                                                                 |__/
    ".bright_cyan());

    println!("{} {}", "creator-directory".bright_cyan(), env!("CARGO_PKG_VERSION").bright_green());
    println!("{}", "Server-rendered creator directory backed by PostgREST".bright_white());
    println!();

    if let Err(e) = cli::execute(cli).await {
        error!("Error: {}", e);

        // 打印错误链
        let mut source = e.source();
        while let Some(e) = source {
            error!("Caused by: {}", e);
            source = e.source();
        }

        std::process::exit(1);
    }

    Ok(())
}
