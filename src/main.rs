// src/main.rs
//
// Runs one deduplication batch over a JSON array of source records:
// attribute extraction and quality scoring, duplicate clustering, enrichment
// through the reference catalog and the configured completion provider.
// The frozen batch result is written as JSON. Ctrl+C stops the batch
// cooperatively and the partial result is still written.
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dedupe_lib::external::{
    AttributeExtractor, BenchmarkLookup, ChecksumValidators, InMemoryBenchmarkCatalog, JsonAttributeExtractor,
};
use dedupe_lib::models::SourceRecord;
use dedupe_lib::orchestrator::{
    BatchConfig, BatchOrchestrator, BatchState, HttpCompletionProvider, HttpProviderConfig, NormalizationProvider,
    ProviderChain, StopSignal,
};
use dedupe_lib::similarity::{PipelineConfig, SimilarityPipeline};
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::get_memory_usage;
use dedupe_lib::utils::progress_bars::progress_callback::{ProgressEvent, ProgressSink};
use dedupe_lib::utils::progress_bars::progress_config::{print_env_config_example, ProgressConfig};

/// Stages a batch moves through before finishing.
const BATCH_STAGES: u64 = 4;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct DedupeArgs {
    /// JSON array of source records ({"id", "name", "attributes"})
    #[arg(required_unless_present = "print_env")]
    input: Option<PathBuf>,

    /// Where the batch result is written
    #[arg(short, long, default_value = "dedupe_result.json")]
    output: PathBuf,

    /// JSON array of reference records used for enrichment
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Similarity preset: default, fast or precise
    #[arg(long, default_value = "default")]
    preset: String,

    /// Pipeline configuration JSON; overrides --preset
    #[arg(long)]
    pipeline_config: Option<PathBuf>,

    /// Print the progress environment variables and exit
    #[arg(long)]
    print_env: bool,
}

fn load_pipeline_config(args: &DedupeArgs) -> Result<PipelineConfig> {
    match &args.pipeline_config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid pipeline config {}", path.display()))
        }
        None => PipelineConfig::preset(&args.preset)
            .with_context(|| format!("Unknown preset '{}': expected default, fast or precise", args.preset)),
    }
}

fn load_records(path: &Path) -> Result<Vec<SourceRecord>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read input {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid source records in {}", path.display()))
}

fn stage_bar(progress_config: &ProgressConfig) -> Result<Option<ProgressBar>> {
    let Some(mp) = progress_config.create_multi_progress() else {
        return Ok(None);
    };
    let pb = mp.add(ProgressBar::new(BATCH_STAGES));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Failed to set progress bar style")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.enable_steady_tick(progress_config.refresh_interval());
    pb.set_message("Initializing batch...");
    Ok(Some(pb))
}

fn render_event(pb: &ProgressBar, event: &ProgressEvent, detailed: bool) {
    if event.phase.ends_with(" complete") {
        pb.inc(1);
    }
    if detailed {
        pb.set_message(event.to_string());
    } else {
        pb.set_message(event.phase.clone());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = DedupeArgs::parse();

    if args.print_env {
        print_env_config_example();
        return Ok(());
    }
    let Some(input) = args.input.as_deref() else {
        bail!("An input file is required");
    };

    info!("🚀 Starting master-data deduplication batch");
    let start_time = Instant::now();

    let progress_config = ProgressConfig::from_env();
    progress_config.log_config();
    let batch_config = BatchConfig::from_env();
    batch_config.log_config();

    let pipeline_config = load_pipeline_config(&args)?;
    let pipeline =
        Arc::new(SimilarityPipeline::new(pipeline_config).context("Invalid similarity pipeline configuration")?);

    let records = load_records(input)?;
    info!("📥 Loaded {} source records from {}", records.len(), input.display());

    let catalog: Option<Arc<dyn BenchmarkLookup>> = match &args.catalog {
        Some(path) => {
            let catalog = InMemoryBenchmarkCatalog::from_json_file(path)?;
            info!("📚 Loaded {} reference records from {}", catalog.len(), path.display());
            let catalog: Arc<dyn BenchmarkLookup> = Arc::new(catalog);
            Some(catalog)
        }
        None => None,
    };

    let mut providers: Vec<Arc<dyn NormalizationProvider>> = Vec::new();
    match HttpProviderConfig::from_env() {
        Some(config) => {
            config.log_config();
            providers.push(Arc::new(HttpCompletionProvider::new(config)));
        }
        None => info!("ℹ️ PROVIDER_URL not set; enrichment uses the reference catalog only"),
    }
    let chain = ProviderChain::new(providers, batch_config.provider_timeout).with_retries(batch_config.provider_retries);

    let extractor: Arc<dyn AttributeExtractor> = Arc::new(JsonAttributeExtractor);
    let mut orchestrator = BatchOrchestrator::new(
        batch_config.clone(),
        Arc::clone(&pipeline),
        extractor,
        Arc::new(ChecksumValidators),
        chain,
    );
    if let Some(catalog) = catalog {
        orchestrator = orchestrator.with_benchmark(catalog);
    }

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && ctrl_c_stop.stop() {
            warn!("🛑 Stop requested; finishing the current record");
        }
    });

    let (sink, mut events) = ProgressSink::channel(progress_config.buffer_size);
    orchestrator = orchestrator.with_progress(sink.callback());
    let pb = stage_bar(&progress_config)?;
    let render_pb = pb.clone();
    let detailed = progress_config.should_show_detailed();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(pb) = &render_pb {
                render_event(pb, &event, detailed);
            }
        }
    });

    let outcome = orchestrator.run(&records, &stop).await;
    // Dropping every sender lets the renderer drain and exit.
    let dropped_events = sink.dropped();
    drop(orchestrator);
    drop(sink);
    if let Err(e) = renderer.await {
        warn!("Progress renderer ended abnormally: {}", e);
    }
    if let Some(pb) = &pb {
        pb.finish_with_message(outcome.result.state.to_string());
    }

    let result = &outcome.result;
    let json = serde_json::to_string_pretty(result).context("Failed to serialize batch result")?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write batch result to {}", args.output.display()))?;
    info!("💾 Batch result written to {}", args.output.display());

    let total_time = start_time.elapsed();
    info!("=== Pipeline Summary ===");
    info!("Run ID: {}", result.run_id);
    info!("Final state: {}", result.state);
    info!("Records processed: {}/{}", result.total_processed, records.len());
    info!("Duplicate groups: {}", result.duplicate_groups);
    info!("Records in duplicate groups: {}", result.total_duplicates);
    info!("Benchmark matches: {}", result.benchmark_matches);
    info!("Enriched records: {}", result.enriched_count);
    info!("New reference records: {}", result.created_benchmarks);
    info!("Errors: {}", result.errors.len());
    if dropped_events > 0 {
        info!("Progress events dropped: {}", dropped_events);
    }
    info!("=== Timing Breakdown ===");
    for phase in ["extraction", "clustering", "enrichment", "finalization"] {
        if let Some(duration) = outcome.phase_times.get(phase) {
            info!("{}: {:.2?}", phase, duration);
        }
    }
    info!("Total execution time: {:.2?}", total_time);

    if progress_config.should_show_memory() {
        let final_memory_mb = get_memory_usage().await;
        info!("Final memory usage: {} MB", final_memory_mb);
    }
    if progress_config.should_show_cache_stats() {
        let cache = pipeline.cache_stats();
        info!(
            "Similarity cache: {} hits, {} misses, {:.1}% hit rate, {} entries",
            cache.hits,
            cache.misses,
            cache.hit_rate * 100.0,
            cache.entries
        );
    }

    if result.state == BatchState::Failed {
        let reason = result.errors.last().map(String::as_str).unwrap_or("unknown error");
        bail!("Batch failed: {}", reason);
    }
    Ok(())
}
