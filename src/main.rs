//! pulmo-triage CLI: radiograph normalization and diagnostic triage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use pulmo_triage::{init_tracing, ImageNormalizer, PrecomputedDetections, TriageConfig, TriageService};

#[derive(Parser)]
#[command(name = "pulmo-triage")]
#[command(about = "Normalize chest radiographs and triage detector findings by clinical priority")]
#[command(version)]
struct Cli {
    /// TOML configuration file (PULMO_* environment variables still apply).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the disease rule table in priority order (JSON).
    Rules,

    /// Normalize one radiograph to a square JPEG.
    Normalize(NormalizeArgs),

    /// Run normalization, triage and annotation for one radiograph.
    Triage(TriageArgs),
}

#[derive(Debug, Clone, Args)]
struct NormalizeArgs {
    /// DICOM or raster input.
    #[arg(long)]
    input: PathBuf,

    /// Output JPEG path.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct TriageArgs {
    /// DICOM or raster input.
    #[arg(long)]
    input: PathBuf,

    /// JSON array of detector outputs for the normalized image.
    #[arg(long)]
    detections: PathBuf,

    /// Write the response envelope here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the risk-annotated JPEG here.
    #[arg(long)]
    annotated: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<TriageConfig> {
    match path {
        Some(p) => TriageConfig::load(p),
        None => Ok(TriageConfig::from_env()?),
    }
}

fn run_rules(config: &TriageConfig) -> Result<()> {
    let service = TriageService::new(config, config.rule_table()?, Arc::new(PrecomputedDetections::default()));
    println!("{}", serde_json::to_string_pretty(&service.rules_envelope())?);
    Ok(())
}

fn run_normalize(config: &TriageConfig, args: &NormalizeArgs) -> Result<()> {
    let normalizer = ImageNormalizer::new(config.normalizer.clone());
    let image = normalizer
        .normalize_file(&args.input)
        .with_context(|| format!("Failed to normalize {}", args.input.display()))?;

    std::fs::write(&args.output, &image.jpeg)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        "Wrote {}x{} image to {}",
        image.width(),
        image.height(),
        args.output.display()
    );
    Ok(())
}

async fn run_triage(config: &TriageConfig, args: &TriageArgs) -> Result<()> {
    let rules = config.rule_table()?;
    let detector = PrecomputedDetections::load(&args.detections, &rules)?
        .with_min_confidence(config.detector_min_confidence);
    let service = TriageService::new(config, rules, Arc::new(detector));

    let bytes = std::fs::read(&args.input).with_context(|| format!("Failed to read {}", args.input.display()))?;
    let file_name = args.input.to_string_lossy().into_owned();
    let outcome = service.analyze(&file_name, bytes).await?;

    if let (Some(path), Some(jpeg)) = (&args.annotated, &outcome.annotated_jpeg) {
        std::fs::write(path, jpeg).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote annotated image to {}", path.display());
    }

    let envelope = serde_json::to_string_pretty(&outcome.to_envelope())?;
    match &args.report {
        Some(path) => {
            std::fs::write(path, envelope).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote report to {}", path.display());
        }
        None => println!("{}", envelope),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Rules => run_rules(&config),
        Commands::Normalize(args) => run_normalize(&config, args),
        Commands::Triage(args) => run_triage(&config, args).await,
    }
}
