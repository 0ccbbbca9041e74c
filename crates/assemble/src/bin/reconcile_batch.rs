use anyhow::{Context, Result};
use assemble::{BatchSpec, Pipeline, PipelineConfig, PortfolioDocument};
use clap::Parser;
use reconcile::{EnrichmentIndex, EnrichmentRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reconcile a portfolio template against weekly grant archives and an
/// optional enrichment snapshot.
#[derive(Debug, Parser)]
#[command(name = "reconcile_batch", version)]
struct Args {
    /// Directory holding unpacked weekly containers (ipgYYMMDD.xml)
    #[arg(long, env = "PATENT_ARCHIVE_DIR")]
    archives: PathBuf,

    /// Portfolio template: {"patents": [{"number": ..}, ..]}
    #[arg(long)]
    template: PathBuf,

    /// JSON object of enrichment records keyed by publication number
    #[arg(long, env = "PATENT_ENRICHMENT_FILE")]
    enrichment: Option<PathBuf>,

    /// Pipeline settings as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the portfolio document (stdout when omitted)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    max_chain_depth: Option<usize>,

    #[arg(long)]
    tolerance_days: Option<i64>,

    #[arg(long)]
    concurrency: Option<usize>,

    /// Fail when an identifier yields neither a record nor enrichment
    #[arg(long)]
    require_complete: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;

    let template = tokio::fs::read_to_string(&args.template)
        .await
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    let batch = BatchSpec::from_json(&template).context("Failed to parse template")?;

    let archives = ingest::load_archives(&args.archives)
        .await
        .with_context(|| format!("Failed to load archives from {}", args.archives.display()))?;
    tracing::info!(containers = archives.len(), targets = batch.len(), "inputs loaded");

    let enrichment = match &args.enrichment {
        Some(path) => load_enrichment(path).await?,
        None => EnrichmentIndex::new(),
    };

    let pipeline = Pipeline::new(config, Arc::new(archives), enrichment);
    let document = pipeline.run(&batch).await?;

    print_summary(&document);

    let json = serde_json::to_string_pretty(&document)?;
    match &args.out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Portfolio saved to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw).context("Failed to parse pipeline config")?
        }
        None => PipelineConfig::default(),
    };

    if let Some(depth) = args.max_chain_depth {
        config.max_chain_depth = depth;
    }
    if let Some(days) = args.tolerance_days {
        config.expiration_tolerance_days = days;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if args.require_complete {
        config.require_complete = true;
    }
    Ok(config)
}

async fn load_enrichment(path: &Path) -> Result<EnrichmentIndex> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read enrichment {}", path.display()))?;
    let records: HashMap<String, EnrichmentRecord> =
        serde_json::from_str(&raw).context("Failed to parse enrichment records")?;
    Ok(EnrichmentIndex::from_map(records))
}

fn print_summary(document: &PortfolioDocument) {
    let summary = &document.portfolio;
    eprintln!("\n=== PORTFOLIO ===");
    eprintln!("  Assignee:     {}", summary.assignee.as_deref().unwrap_or("-"));
    eprintln!("  Reconciled:   {}", summary.record_count);
    eprintln!("  Failed:       {}", summary.failed_count);
    eprintln!("  Forward cites: {}", summary.total_forward_cites);

    for failed in document.failed() {
        eprintln!("  ✗ {} ({:?}): {}", failed.identifier, failed.kind, failed.message);
    }
    let conflicts: usize = document.reconciled().map(|r| r.conflicts.len()).sum();
    eprintln!("  Conflicts:    {}", conflicts);
}
