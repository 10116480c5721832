use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fdms_core::ingestion::{load_inputs, load_table};
use fdms_core::outputs::{parquet_bytes, write_csv, RunSummary};
use fdms_core::steps::all_step_descriptors;
use fdms_core::{Pipeline, PipelineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "FDMS series reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the computation steps for one country and export the results
    Run(RunArgs),
    /// Parse an input table and print it
    Inspect(InspectArgs),
    /// List the available computation steps
    Steps,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration (falls back to FDMS_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured country
    #[arg(long)]
    country: Option<String>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Wide CSV or AMECO text file
    file: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Inspect(args) => {
            let parsed = load_table(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let df = parsed
                .to_dataframe()
                .context("failed to build dataframe from parsed table")?;
            info!(format = %parsed.format, rows = parsed.len(), "parsed input table");
            println!("{df}");
            Ok(())
        }
        Command::Steps => {
            for descriptor in all_step_descriptors() {
                println!(
                    "{:<20} {:<8} {}",
                    descriptor.code, descriptor.version, descriptor.description
                );
            }
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config_path = config_path(args.config)?;
    let mut config = PipelineConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration {}", config_path.display()))?;
    if let Some(country) = args.country {
        config.country = country;
        config.validate()?;
    }

    let (inputs, input_reports) = load_inputs(&config).context("failed to load input tables")?;
    let pipeline = Pipeline::standard(&config)?;
    info!(
        country = %config.country,
        steps = ?pipeline.step_codes(),
        "starting pipeline"
    );

    let settings = config.settings();
    let output = pipeline
        .run(&settings, &inputs)
        .context("pipeline run failed")?;
    let summary = RunSummary::new(&settings, input_reports, &output);
    if summary.skipped_count() > 0 {
        warn!(skipped = summary.skipped_count(), "some variables were skipped");
    }

    let window = Some(settings.window);
    if let Some(path) = &config.outputs.csv {
        let file = create_output(path)?;
        write_csv(&output.table, window, BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote csv export");
    }
    if let Some(path) = &config.outputs.parquet {
        let bytes = parquet_bytes(&output.table, window).context("failed to serialize parquet")?;
        create_parent(path)?;
        fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote parquet export");
    }
    if let Some(path) = &config.outputs.summary {
        let bytes = summary.to_json().context("failed to serialize run summary")?;
        create_parent(path)?;
        fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote run summary");
    }

    info!(variables = output.table.len(), "pipeline complete");
    Ok(())
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dotenvy::dotenv().ok();
    let path = std::env::var("FDMS_CONFIG").context("--config or FDMS_CONFIG must be set")?;
    Ok(PathBuf::from(path))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn create_output(path: &Path) -> Result<File> {
    create_parent(path)?;
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}
