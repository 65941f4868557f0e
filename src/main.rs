use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use subtotal_tools::batch;
use subtotal_tools::{PipelineConfig, Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract(args) => execute_extract(args),
    }
}

fn execute_extract(args: ExtractArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(ToolError::MissingInput(path.clone()));
            }
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if args.coerce_quantity {
        config.coerce_quantity = true;
    }

    let output = batch::run_paths(&args.inputs, &args.output, &config)?;

    if let Some(report_path) = &args.report {
        let report = serde_json::to_string_pretty(&output.report())?;
        fs::write(report_path, report)?;
    }

    for row in &output.summary.rows {
        println!(
            "{}\t{}\t{}\t{}",
            row.label,
            row.source_sheet,
            row.row_count,
            row.sums.get(&config.primary_sum_field).copied().unwrap_or(0.0)
        );
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract subtotal rows from billing workbooks into one summary workbook."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a batch of workbooks and write the combined result.
    Extract(ExtractArgs),
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Source workbooks (.xlsx), processed in the given order.
    #[arg(long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Output workbook path.
    #[arg(long)]
    output: PathBuf,

    /// Optional JSON file overriding the pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also coerce the quantity column to numbers.
    #[arg(long)]
    coerce_quantity: bool,

    /// Optional path receiving a JSON report of the summary and column
    /// resolution.
    #[arg(long)]
    report: Option<PathBuf>,
}
