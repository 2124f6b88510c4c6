//! FXLab CLI — daily capture, historical backfill, and store status.
//!
//! Commands:
//! - `daily` — capture, validate, and aggregate a single business date
//! - `historical` — backfill an inclusive date range, one date at a time
//! - `status` — report what the layered store holds

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fxlab_core::store::LayerStore;
use fxlab_runner::config::PipelineConfig;
use fxlab_runner::insight::{ChatCompletionsClient, InsightGenerator};
use fxlab_runner::pipeline::{source_from_config, PipelineOrchestrator};
use fxlab_runner::report::RunReport;

#[derive(Parser)]
#[command(name = "fxlab", about = "FXLab CLI — layered FX rate pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture, validate, and aggregate a single business date.
    Daily {
        /// Business date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Backfill an inclusive date range. Dates are processed
    /// independently; one failed date does not stop the rest.
    Historical {
        /// Range start (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: String,

        /// Range end (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: String,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Report what the layered store holds.
    Status {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the deterministic synthetic source instead of the live API.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Skip insight generation for this run.
    #[arg(long, default_value_t = false)]
    no_insight: bool,

    /// Store directory. Overrides the config's store.data_dir.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daily { date, common } => {
            let date = parse_date_or_today(date.as_deref())?;
            let orchestrator = build_orchestrator(&common)?;
            finish(orchestrator.run_daily(date)?)
        }
        Commands::Historical { start, end, common } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            if start > end {
                bail!("--start {start} is after --end {end}");
            }
            let orchestrator = build_orchestrator(&common)?;
            finish(orchestrator.run_historical(start, end)?)
        }
        Commands::Status { data_dir } => run_status(&data_dir),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{s}': {e}"))
}

fn parse_date_or_today(s: Option<&str>) -> Result<NaiveDate> {
    match s {
        Some(s) => parse_date(s),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn build_orchestrator(common: &CommonArgs) -> Result<PipelineOrchestrator> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if common.synthetic {
        config.source.provider = fxlab_runner::config::ProviderKind::Synthetic;
    }
    if common.no_insight {
        config.insight.enabled = false;
    }
    if let Some(dir) = &common.data_dir {
        config.store.data_dir = dir.display().to_string();
    }

    let source = source_from_config(&config)?;
    let store = LayerStore::new(&config.store.data_dir);

    let insight: Option<Box<dyn InsightGenerator>> = if config.insight.enabled {
        // A missing API key degrades to a no-insight run instead of
        // refusing to start. Insight stays enabled in the config, so
        // the orchestrator reports the stage as failed and the run
        // finishes as succeeded-without-insight.
        match ChatCompletionsClient::from_config(&config.insight) {
            Ok(client) => Some(Box::new(client)),
            Err(e) => {
                eprintln!("insight disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    Ok(PipelineOrchestrator::new(config, store, source, insight))
}

fn finish(report: RunReport) -> Result<()> {
    print!("{}", report.render());
    if report.status.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(data_dir: &PathBuf) -> Result<()> {
    let store = LayerStore::new(data_dir);
    let metas = store.status()?;

    if metas.is_empty() {
        println!("store at {} is empty", data_dir.display());
        return Ok(());
    }

    println!("store at {}", data_dir.display());
    println!("layer        date         base  records  source");
    for meta in &metas {
        println!(
            "{:<12} {}   {:<4} {:>7}  {}",
            meta.layer.to_string(),
            meta.business_date,
            meta.base,
            meta.record_count,
            meta.source.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
