// src/orchestrator/batch.rs - Cancellable batch run: extraction, clustering, enrichment, finalization

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::providers::ProviderChain;
use super::quality::{score_record, QualityWeights};
use super::signal::StopSignal;
use super::state::BatchState;
use crate::clustering::{ClusterRecord, ClusteringConfig, ClusteringEngine};
use crate::error::BatchError;
use crate::external::{AttributeExtractor, BenchmarkLookup, TaxIdValidator};
use crate::models::{
    BatchProcessingResult, EnrichmentOutcome, EnrichmentSource, ExtractedAttributes, RecordOutcome,
    ReferenceRecord, SourceRecord,
};
use crate::similarity::SimilarityPipeline;
use crate::utils::constants::{
    DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_ENRICH_CONFIDENCE_BELOW, DEFAULT_PROGRESS_EVERY,
    DEFAULT_PROVIDER_TIMEOUT_SECS, PROVIDER_SYSTEM_PROMPT, PROVIDER_USER_PROMPT_TEMPLATE,
};
use crate::utils::env::{env_opt, env_or};
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::BatchLogger;
use crate::utils::progress_bars::progress_callback::{ProgressCallback, ProgressTracker};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    /// Records (or enrichment items) between two stop checks.
    pub cancel_check_interval: usize,
    pub progress_every: usize,
    pub provider_timeout: Duration,
    pub provider_retries: usize,
    pub enrichment_enabled: bool,
    /// Cluster members are enriched when their cluster confidence is below this.
    pub enrich_confidence_below: f64,
    pub use_candidate_index: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            project_id: None,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            progress_every: DEFAULT_PROGRESS_EVERY,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            provider_retries: 0,
            enrichment_enabled: true,
            enrich_confidence_below: DEFAULT_ENRICH_CONFIDENCE_BELOW,
            use_candidate_index: true,
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            client_id: env_opt("BATCH_CLIENT_ID"),
            project_id: env_opt("BATCH_PROJECT_ID"),
            cancel_check_interval: env_or("BATCH_CANCEL_CHECK_INTERVAL", defaults.cancel_check_interval).max(1),
            progress_every: env_or("BATCH_PROGRESS_EVERY", defaults.progress_every).max(1),
            provider_timeout: Duration::from_secs(env_or(
                "BATCH_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )),
            provider_retries: env_or("BATCH_PROVIDER_RETRIES", defaults.provider_retries),
            enrichment_enabled: env_or("BATCH_ENRICHMENT_ENABLED", defaults.enrichment_enabled),
            enrich_confidence_below: env_or("BATCH_ENRICH_CONFIDENCE_BELOW", defaults.enrich_confidence_below)
                .clamp(0.0, 1.0),
            use_candidate_index: env_or("BATCH_USE_CANDIDATE_INDEX", defaults.use_candidate_index),
        }
    }

    pub fn log_config(&self) {
        info!("📦 Batch Configuration:");
        info!(
            "   Client: {}, project: {}",
            self.client_id.as_deref().unwrap_or("-"),
            self.project_id.as_deref().unwrap_or("-")
        );
        info!(
            "   Stop check every {} records, progress every {} records",
            self.cancel_check_interval, self.progress_every
        );
        info!(
            "   Provider timeout: {:?}, retries per provider: {}",
            self.provider_timeout, self.provider_retries
        );
        info!(
            "   Enrichment: {} (below confidence {:.2})",
            if self.enrichment_enabled { "enabled" } else { "disabled" },
            self.enrich_confidence_below
        );
        info!("   Candidate index: {}", self.use_candidate_index);
    }

    pub fn clustering_config(&self) -> ClusteringConfig {
        ClusteringConfig {
            use_candidate_index: self.use_candidate_index,
            cancel_check_interval: self.cancel_check_interval,
            ..ClusteringConfig::default()
        }
    }
}

/// Frozen result plus wall-clock time per stage.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub result: BatchProcessingResult,
    pub phase_times: HashMap<String, Duration>,
}

/// How a run's stages ended before the terminal state is entered.
enum StageFlow {
    Completed,
    Stopped,
}

/// Per-run working state. The driving task owns it exclusively.
struct RunContext<'a> {
    result: BatchProcessingResult,
    attributes: Vec<ExtractedAttributes>,
    tracker: ProgressTracker,
    logger: BatchLogger,
    phase_times: HashMap<String, Duration>,
    stop: &'a StopSignal,
}

pub struct BatchOrchestrator {
    config: BatchConfig,
    pipeline: Arc<SimilarityPipeline>,
    extractor: Arc<dyn AttributeExtractor>,
    validator: Arc<dyn TaxIdValidator>,
    providers: ProviderChain,
    benchmark: Option<Arc<dyn BenchmarkLookup>>,
    progress: Option<ProgressCallback>,
    quality_weights: QualityWeights,
}

impl BatchOrchestrator {
    pub fn new(
        config: BatchConfig,
        pipeline: Arc<SimilarityPipeline>,
        extractor: Arc<dyn AttributeExtractor>,
        validator: Arc<dyn TaxIdValidator>,
        providers: ProviderChain,
    ) -> Self {
        Self {
            config,
            pipeline,
            extractor,
            validator,
            providers,
            benchmark: None,
            progress: None,
            quality_weights: QualityWeights::default(),
        }
    }

    pub fn with_benchmark(mut self, benchmark: Arc<dyn BenchmarkLookup>) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_quality_weights(mut self, weights: QualityWeights) -> Self {
        self.quality_weights = weights;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs one batch to a terminal state. Always returns a well-formed result:
    /// stopping keeps the partial work and appends a single stop marker, a fatal
    /// error ends the run in `Failed` with its message.
    pub async fn run(&self, records: &[SourceRecord], stop: &StopSignal) -> BatchOutcome {
        let run_id = Uuid::new_v4().to_string();
        let logger = BatchLogger::new(&run_id);
        logger.log_start(
            records.len(),
            self.config.client_id.as_deref(),
            self.config.project_id.as_deref(),
        );

        let mut ctx = RunContext {
            result: BatchProcessingResult::new(
                run_id,
                self.config.client_id.clone(),
                self.config.project_id.clone(),
            ),
            attributes: Vec::with_capacity(records.len()),
            tracker: ProgressTracker::new(self.progress.clone()),
            logger,
            phase_times: HashMap::new(),
            stop,
        };

        let terminal = match self.drive(records, &mut ctx).await {
            Ok(StageFlow::Completed) => BatchState::Completed,
            Ok(StageFlow::Stopped) => {
                ctx.result.mark_stopped();
                ctx.logger.log_stop(ctx.result.total_processed, records.len());
                crate::update_progress!(
                    self.progress,
                    "Stopped",
                    format!("{}/{} records processed", ctx.result.total_processed, records.len())
                );
                BatchState::StoppedByUser
            }
            Err(e) => {
                let message = e.to_string();
                ctx.logger.log_failure(&message);
                ctx.result.add_error(message.clone());
                crate::update_progress!(self.progress, "Failed", message);
                BatchState::Failed
            }
        };

        if !ctx.result.state.can_transition_to(terminal) {
            warn!(
                "Unexpected transition {:?} -> {:?} at end of batch",
                ctx.result.state, terminal
            );
        }
        ctx.result.finish(terminal);
        info!("{} Batch {} finished", terminal.emoji(), ctx.result.run_id);

        BatchOutcome {
            result: ctx.result,
            phase_times: ctx.phase_times,
        }
    }

    async fn drive(&self, records: &[SourceRecord], ctx: &mut RunContext<'_>) -> Result<StageFlow, BatchError> {
        self.enter(ctx, BatchState::Extracting)?;
        if ctx.stop.is_stopped() {
            return Ok(StageFlow::Stopped);
        }
        if let StageFlow::Stopped = self.extract_stage(records, ctx)? {
            return Ok(StageFlow::Stopped);
        }

        self.enter(ctx, BatchState::Clustering)?;
        if ctx.stop.is_stopped() {
            return Ok(StageFlow::Stopped);
        }
        if let StageFlow::Stopped = self.cluster_stage(ctx).await? {
            return Ok(StageFlow::Stopped);
        }

        self.enter(ctx, BatchState::Enriching)?;
        if ctx.stop.is_stopped() {
            return Ok(StageFlow::Stopped);
        }
        if let StageFlow::Stopped = self.enrich_stage(ctx).await? {
            return Ok(StageFlow::Stopped);
        }

        self.enter(ctx, BatchState::Finalizing)?;
        if ctx.stop.is_stopped() {
            return Ok(StageFlow::Stopped);
        }
        self.finalize_stage(ctx).await;
        Ok(StageFlow::Completed)
    }

    fn enter(&self, ctx: &mut RunContext<'_>, next: BatchState) -> Result<(), BatchError> {
        let current = ctx.result.state;
        if !current.can_transition_to(next) {
            return Err(BatchError::fatal(format!(
                "illegal state transition {:?} -> {:?}",
                current, next
            )));
        }
        ctx.result.state = next;
        ctx.logger.log_phase(next.description(), None);
        ctx.tracker.set_phase(next.description());
        Ok(())
    }

    /// The in-flight record always finishes; the stop flag is read only between records.
    fn should_stop(&self, ctx: &RunContext<'_>, position: usize) -> bool {
        position > 0 && position % self.config.cancel_check_interval.max(1) == 0 && ctx.stop.is_stopped()
    }

    fn extract_stage(&self, records: &[SourceRecord], ctx: &mut RunContext<'_>) -> Result<StageFlow, BatchError> {
        let start = Instant::now();
        let total = records.len();
        let progress_every = self.config.progress_every.max(1);
        let mut flow = StageFlow::Completed;

        for (index, record) in records.iter().enumerate() {
            if self.should_stop(ctx, index) {
                flow = StageFlow::Stopped;
                break;
            }

            let attributes = match self.extractor.extract(&record.attributes) {
                Ok(attributes) => attributes,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = format!("record {} ({}): extraction failed: {}", index, record.id, e);
                    ctx.logger.log_record_error(index, &message);
                    ctx.result.add_error(message);
                    ExtractedAttributes::default()
                }
            };

            let assessment = score_record(&record.name, &attributes, self.validator.as_ref(), &self.quality_weights);
            ctx.result.records.push(RecordOutcome {
                index,
                source_id: record.id.clone(),
                name: record.name.clone(),
                normalized_name: self.pipeline.normalize(&record.name),
                quality_score: assessment.score,
                quality_issues: assessment.issues,
                cluster_id: None,
                is_master: false,
                enrichment: None,
            });
            ctx.attributes.push(attributes);
            ctx.result.total_processed += 1;

            let done = index + 1;
            if done % progress_every == 0 || done == total {
                ctx.tracker.update_progress(done, total);
            }
        }

        let duration = start.elapsed();
        ctx.phase_times.insert("extraction".to_string(), duration);
        ctx.logger
            .log_stage_complete("Extraction", ctx.result.total_processed, duration);
        ctx.tracker
            .finish_phase(&format!("{} records extracted", ctx.result.total_processed));
        Ok(flow)
    }

    async fn cluster_stage(&self, ctx: &mut RunContext<'_>) -> Result<StageFlow, BatchError> {
        let start = Instant::now();
        let cluster_records: Vec<ClusterRecord> = ctx
            .result
            .records
            .iter()
            .map(|r| ClusterRecord {
                index: r.index,
                text: r.name.clone(),
                completeness: r.quality_score,
            })
            .collect();

        let engine = ClusteringEngine::new(Arc::clone(&self.pipeline), self.config.clustering_config());
        let stop = ctx.stop.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            engine.cluster_with_stop(&cluster_records, &|| stop.is_stopped())
        })
        .await
        .map_err(|e| BatchError::fatal(format!("clustering task failed: {}", e)))?;

        for cluster in &outcome.clusters {
            for &member in &cluster.members {
                if let Some(record) = ctx.result.records.get_mut(member) {
                    record.cluster_id = Some(cluster.id);
                    record.is_master = member == cluster.master;
                }
            }
        }
        ctx.result.duplicate_groups = outcome.clusters.len();
        ctx.result.total_duplicates = outcome.stats.duplicates;
        ctx.result.clusters = outcome.clusters;

        let duration = start.elapsed();
        ctx.phase_times.insert("clustering".to_string(), duration);
        ctx.logger
            .log_stage_complete("Clustering", outcome.stats.records, duration);
        ctx.tracker.finish_phase(&format!(
            "{} groups, {} duplicates, {} comparisons",
            ctx.result.duplicate_groups, ctx.result.total_duplicates, outcome.stats.comparisons
        ));

        Ok(if outcome.interrupted {
            StageFlow::Stopped
        } else {
            StageFlow::Completed
        })
    }

    /// Records outside any cluster, plus members of clusters we are not confident about.
    fn enrichment_targets(&self, result: &BatchProcessingResult) -> Vec<usize> {
        let threshold = self.config.enrich_confidence_below;
        result
            .records
            .iter()
            .filter(|r| match r.cluster_id {
                None => true,
                Some(id) => result
                    .clusters
                    .get(id)
                    .is_some_and(|c| c.confidence < threshold),
            })
            .map(|r| r.index)
            .collect()
    }

    async fn enrich_stage(&self, ctx: &mut RunContext<'_>) -> Result<StageFlow, BatchError> {
        if !self.config.enrichment_enabled {
            debug!("Enrichment disabled; skipping stage");
            return Ok(StageFlow::Completed);
        }
        if self.benchmark.is_none() && self.providers.enabled_count() == 0 {
            info!("ℹ️ No benchmark catalog or enabled provider; nothing to enrich with");
            return Ok(StageFlow::Completed);
        }

        let start = Instant::now();
        let targets = self.enrichment_targets(&ctx.result);
        let total = targets.len();
        let progress_every = self.config.progress_every.max(1);
        let mut flow = StageFlow::Completed;

        for (position, &index) in targets.iter().enumerate() {
            if self.should_stop(ctx, position) {
                flow = StageFlow::Stopped;
                break;
            }
            self.enrich_record(ctx, index).await?;

            let done = position + 1;
            if done % progress_every == 0 || done == total {
                ctx.tracker.update_progress_with_info(
                    done,
                    total,
                    &format!("{} enriched", ctx.result.enriched_count),
                );
            }
        }

        let duration = start.elapsed();
        ctx.phase_times.insert("enrichment".to_string(), duration);
        ctx.logger.log_stage_complete("Enrichment", total, duration);
        ctx.tracker.finish_phase(&format!(
            "{} enriched, {} from benchmark, {} new reference records",
            ctx.result.enriched_count, ctx.result.benchmark_matches, ctx.result.created_benchmarks
        ));
        Ok(flow)
    }

    /// Benchmark first, then the provider chain. Only fatal errors propagate.
    async fn enrich_record(&self, ctx: &mut RunContext<'_>, index: usize) -> Result<(), BatchError> {
        let (name, source_id) = match ctx.result.records.get(index) {
            Some(record) => (record.name.clone(), record.source_id.clone()),
            None => return Ok(()),
        };
        let attributes = ctx.attributes.get(index).cloned().unwrap_or_default();

        if let Some(benchmark) = &self.benchmark {
            match benchmark.find(&name, &attributes).await {
                Ok(Some(reference)) => {
                    ctx.result.benchmark_matches += 1;
                    ctx.result.enriched_count += 1;
                    ctx.result.records[index].enrichment = Some(EnrichmentOutcome {
                        source: EnrichmentSource::Benchmark,
                        provider: None,
                        canonical_name: reference.canonical_name,
                        reference_id: Some(reference.id),
                    });
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = format!("record {} ({}): benchmark lookup failed: {}", index, source_id, e);
                    ctx.logger.log_record_error(index, &message);
                    ctx.result.add_error(message);
                }
            }
        }

        if self.providers.enabled_count() == 0 {
            return Ok(());
        }

        let prompt = PROVIDER_USER_PROMPT_TEMPLATE.replace("{name}", &name);
        let completion = match self.providers.complete(PROVIDER_SYSTEM_PROMPT, &prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                let message = format!("record {} ({}): enrichment failed: {}", index, source_id, e);
                ctx.logger.log_provider_fallback(index, &message);
                ctx.result.add_error(message);
                return Ok(());
            }
        };

        let mut reference_id = None;
        if let Some(benchmark) = &self.benchmark {
            let reference = ReferenceRecord {
                id: Uuid::new_v4().to_string(),
                canonical_name: completion.text.clone(),
                tax_id: attributes.tax_id.clone().or(attributes.business_id.clone()),
            };
            let id = reference.id.clone();
            match benchmark.register(reference).await {
                Ok(true) => {
                    ctx.result.created_benchmarks += 1;
                    reference_id = Some(id);
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = format!("record {} ({}): reference registration failed: {}", index, source_id, e);
                    ctx.logger.log_record_error(index, &message);
                    ctx.result.add_error(message);
                }
            }
        }

        ctx.result.enriched_count += 1;
        ctx.result.records[index].enrichment = Some(EnrichmentOutcome {
            source: EnrichmentSource::Provider,
            provider: Some(completion.provider),
            canonical_name: completion.text,
            reference_id,
        });
        Ok(())
    }

    async fn finalize_stage(&self, ctx: &mut RunContext<'_>) {
        let start = Instant::now();
        let result = &ctx.result;
        let average_quality = if result.records.is_empty() {
            0.0
        } else {
            result.records.iter().map(|r| r.quality_score).sum::<f64>() / result.records.len() as f64
        };
        info!(
            "📊 Average quality score: {:.3} over {} records",
            average_quality,
            result.records.len()
        );
        let cache = self.pipeline.cache_stats();
        debug!(
            "Similarity cache: {} hits, {} misses, {} entries",
            cache.hits, cache.misses, cache.entries
        );

        ctx.logger.log_completion(
            result.total_processed,
            result.duplicate_groups,
            result.total_duplicates,
            result.enriched_count,
            result.errors.len(),
        );
        ctx.logger
            .log_performance_summary(result.total_processed, Some(get_memory_usage().await));
        ctx.phase_times
            .insert("finalization".to_string(), start.elapsed());
        ctx.tracker.finish_phase("results frozen");
    }
}
