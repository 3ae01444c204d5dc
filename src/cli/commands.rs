use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use crate::core::sitemap::build_sitemaps;
use crate::core::{AppState, Server};
use crate::models::{Catalog, Config};
use crate::theme::anchors::{self, Anchor};
use crate::theme::{Locale, TemplateStore};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 配置文件
    #[arg(short, long, default_value = "site.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 启动服务器
    Serve(ServeArgs),

    /// 生成分片站点地图
    BuildSitemaps(SitemapArgs),

    /// 检查模板中的注入锚点
    CheckTemplates,
}

#[derive(Args)]
pub struct ServeArgs {
    /// 服务器端口，默认取配置
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args)]
pub struct SitemapArgs {
    /// 输出目录，默认为 paths.public_dir
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// 单个模板的检查结果
#[derive(Debug, Clone)]
pub struct TemplateCheck {
    pub path: String,
    pub missing: Vec<&'static str>,
    /// 模板无法读取时的错误
    pub error: Option<String>,
}

impl TemplateCheck {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.error.is_none()
    }
}

/// 读取每个页面模板，列出渲染时会缺失的锚点
pub async fn check_templates(store: &TemplateStore, catalog: &Catalog) -> Vec<TemplateCheck> {
    let mut targets: Vec<(String, Vec<&'static Anchor>)> = vec![
        ("index.html".to_string(), anchors::home_page()),
        ("es/index.html".to_string(), anchors::home_page()),
        ("category.html".to_string(), anchors::category_page()),
        ("es/category.html".to_string(), anchors::category_page()),
        ("categories.html".to_string(), anchors::categories_hub()),
        ("blog.html".to_string(), anchors::blog_list()),
        ("blog-post.html".to_string(), anchors::blog_post()),
    ];
    for country in &catalog.countries {
        for locale in [Locale::En, Locale::Es] {
            targets.push((country.locale(locale).template.clone(), anchors::country_page()));
        }
    }

    let mut checks = Vec::with_capacity(targets.len());
    for (path, expected) in targets {
        let check = match store.get(&path).await {
            Ok(html) => TemplateCheck {
                missing: expected
                    .iter()
                    .filter(|anchor| !anchor.is_present(&html))
                    .map(|anchor| anchor.name)
                    .collect(),
                error: None,
                path,
            },
            Err(e) => TemplateCheck {
                missing: Vec::new(),
                error: Some(e.to_string()),
                path,
            },
        };
        checks.push(check);
    }
    checks
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve(args) => {
            let port = args.port.unwrap_or(config.server.port);
            let state = AppState::from_config(config)?.shared();
            Server::new(state, port).start().await?;
        }
        Commands::BuildSitemaps(args) => {
            let out = args.out.unwrap_or_else(|| config.paths.public_dir.clone());
            let state = AppState::from_config(config)?;
            if !state.config.upstream_ready() {
                bail!("SUPABASE_URL and SUPABASE_KEY must be set to build creator sitemaps");
            }
            let report = build_sitemaps(
                state.base_url(),
                &out,
                &state.catalog,
                &state.blog,
                state.store.as_ref(),
            )
            .await?;
            for file in &report.files {
                info!("Wrote {}", file.display());
            }
            println!(
                "{} {} sitemap files, {} creators",
                "✓".bright_green(),
                report.files.len(),
                report.creators
            );
        }
        Commands::CheckTemplates => {
            let catalog = Catalog::load(&config.catalog_path())?;
            let store = TemplateStore::new(config.paths.site_root.clone());
            let checks = check_templates(&store, &catalog).await;

            let mut failed = 0;
            for check in &checks {
                if check.is_ok() {
                    println!("{} {}", "✓".bright_green(), check.path);
                    continue;
                }
                failed += 1;
                match &check.error {
                    Some(error) => println!("{} {}: {}", "✗".bright_red(), check.path, error),
                    None => println!(
                        "{} {}: missing {}",
                        "✗".bright_red(),
                        check.path,
                        check.missing.join(", ").yellow()
                    ),
                }
            }
            if failed > 0 {
                bail!("{} of {} templates have missing anchors", failed, checks.len());
            }
            println!("All {} templates OK", checks.len());
        }
    }

    Ok(())
}
