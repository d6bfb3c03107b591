// Sales Dashboard - API Server
// Read-only JSON endpoints over the consolidated branch data

use anyhow::{Context, Result};
use clap::Parser;
use sales_dashboard::{init_logging, server, Config, MonthLocale};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sales-server", version, about = "Sales dashboard JSON API")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Branch source as LABEL=PATH (repeatable)
    #[arg(long = "source", value_name = "LABEL=PATH")]
    sources: Vec<String>,

    /// Month name language (en, fr)
    #[arg(long)]
    locale: Option<MonthLocale>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(Level::INFO, false);

    let config = Config::resolve(cli.config.as_deref(), &cli.sources, cli.locale)
        .context("Invalid configuration")?;

    for branch in &config.branches {
        match &branch.path {
            Some(path) => info!(branch = %branch.label, path = %path.display(), "branch source"),
            None => info!(branch = %branch.label, "branch source not configured yet"),
        }
    }

    let app = server::router(config);

    let listener = tokio::net::TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.addr))?;

    info!("🚀 Server running on http://{}", cli.addr);
    info!("   API: http://{}/api/kpis", cli.addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
