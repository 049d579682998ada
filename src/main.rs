use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use salary_prep::config::Config;
use salary_prep::dataset;
use salary_prep::fx::{FallbackFxRateProvider, FxRateProvider};
use salary_prep::logging::init_logging;
use salary_prep::observability::metrics;
use salary_prep::pipeline::diagnostics::Diagnostics;
use salary_prep::pipeline::{Pipeline, PipelineContext, Table};

#[derive(Parser)]
#[command(name = "salary_prep")]
#[command(about = "Preprocess résumé exports into a salary regression dataset")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config (defaults to $SALARY_PREP_CONFIG or config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the preprocessing pipeline on a CSV export
    Run {
        /// Source CSV with a header row
        #[arg(long)]
        input: PathBuf,
        /// Directory for the processed table, diagnostics and the FX cache
        #[arg(long, default_value = "output")]
        workspace: PathBuf,
        /// Fetch fresh rates from the CBR feed before using the cache
        #[arg(long)]
        online_fx: bool,
    },
    /// Show the FX rates a run would use
    Rates {
        #[arg(long, default_value = "output")]
        workspace: PathBuf,
        #[arg(long)]
        online_fx: bool,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = init_logging(&config.logging);

    match cli.command {
        Commands::Run {
            input,
            workspace,
            online_fx,
        } => {
            config.fx.online |= online_fx;
            println!("🚀 Running salary preprocessing on {}...", input.display());
            run(&config, &input, &workspace)
        }
        Commands::Rates {
            workspace,
            online_fx,
        } => {
            config.fx.online |= online_fx;
            show_rates(&config, &workspace)
        }
    }
}

fn run(config: &Config, input: &Path, workspace: &Path) -> Result<()> {
    let metrics_handle = match config.output.metrics_file {
        Some(_) => Some(metrics::init()?),
        None => None,
    };

    let delimiter = dataset::delimiter_byte(config.input.delimiter)?;
    let table = dataset::read_csv(input, delimiter)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let pipeline = Pipeline::standard(Box::new(FallbackFxRateProvider::from_config(&config.fx)));
    let ctx = PipelineContext::new(table, workspace);
    info!(run_id = %ctx.run_id(), "Starting pipeline");

    let ctx = pipeline.run(ctx).map_err(|e| {
        if e.is_precondition() {
            error!("Pipeline aborted on precondition: {}", e);
        } else {
            error!("Pipeline failed: {}", e);
        }
        e
    })?;

    let (table, diagnostics) = ctx.into_parts();
    let table = table.context("Pipeline finished without a table")?;

    let table_path = workspace.join(&config.output.table_file);
    dataset::write_csv(&table, &table_path, delimiter)?;
    let diagnostics_path = workspace.join(&config.output.diagnostics_file);
    dataset::write_diagnostics(&diagnostics, &diagnostics_path)?;

    if let (Some(handle), Some(file)) = (metrics_handle, &config.output.metrics_file) {
        let path = workspace.join(file);
        fs::write(&path, handle.render())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    print_summary(&table, &diagnostics, &table_path);
    Ok(())
}

fn print_summary(table: &Table, diagnostics: &Diagnostics, table_path: &Path) {
    println!("\n📊 Pipeline Results:");
    println!("   Rows: {}", table.row_count());
    println!("   Columns: {}", table.column_count());
    println!(
        "   FX rates: {}",
        diagnostics.fx_rates_source().unwrap_or("unknown")
    );
    if let Some(salary) = diagnostics.salary() {
        println!(
            "   Salaries converted: {}",
            table.row_count() - salary.rows_with_null_target
        );
        println!("   Without target: {}", salary.rows_with_null_target);
        println!("   Negotiable: {}", salary.negotiable_rows);
        for (currency, count) in &salary.unconvertible_currencies {
            println!("   Unconvertible {}: {}", currency, count);
        }
    }
    println!("   Output file: {}", table_path.display());

    if !diagnostics.warnings().is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in diagnostics.warnings() {
            println!("   - [{}] {}", warning.stage, warning.message);
        }
    }
}

fn show_rates(config: &Config, workspace: &Path) -> Result<()> {
    let provider = FallbackFxRateProvider::from_config(&config.fx);
    println!("Providers: {}", provider.provider_names().join(" -> "));

    let rates = provider
        .load_rates(workspace)
        .context("No FX provider returned rates")?;
    println!("\n💱 FX rates to RUB ({}):", rates.source);
    if let Some(fetched_at) = rates.fetched_at {
        println!("   Fetched at: {}", fetched_at);
    }
    for (code, rate) in &rates.rates {
        println!("   {:<4} {:>12.4}", code, rate);
    }
    Ok(())
}
