use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sales_dashboard::{init_logging, pipeline, Config, MonthLocale, PipelineError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "sales-dashboard", version, about = "Consolidated sales dashboard")]
struct Cli {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct InputArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Branch source as LABEL=PATH (repeatable)
    #[arg(long = "source", value_name = "LABEL=PATH", global = true)]
    sources: Vec<String>,

    /// Month name language (en, fr)
    #[arg(long, global = true)]
    locale: Option<MonthLocale>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Ui,
    /// Print the KPI summary
    Report {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the KPI fingerprint (identical inputs give identical output)
    Fingerprint,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(e) if e.is_waiting() => {
                println!("⏳ {}", e);
                ExitCode::SUCCESS
            }
            _ => {
                eprintln!("❌ Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(
        cli.inputs.config.as_deref(),
        &cli.inputs.sources,
        cli.inputs.locale,
    )
    .context("Invalid configuration")?;

    match cli.command.unwrap_or(Command::Ui) {
        Command::Ui => run_ui_mode(config),
        Command::Report { json } => {
            init_logging(Level::INFO, true);
            let dashboard = pipeline::run(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard.summary)?);
            } else {
                print!("{}", dashboard.summary.render_text(&config.currency));
            }
            Ok(())
        }
        Command::Fingerprint => {
            init_logging(Level::WARN, true);
            let dashboard = pipeline::run(&config)?;
            println!("{}", dashboard.kpis.fingerprint());
            Ok(())
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: Config) -> Result<()> {
    use sales_dashboard::ui;

    init_logging(Level::WARN, true);

    // Waiting or failing inputs are shown inside the dashboard
    let mut app = ui::App::new(config);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: Config) -> Result<()> {
    anyhow::bail!(
        "TUI mode not available. Rebuild with --features tui, or use `report` or sales-server"
    )
}
