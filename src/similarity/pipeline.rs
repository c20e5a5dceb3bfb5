// src/similarity/pipeline.rs - Multi-algorithm similarity pipeline with threshold abstention

use log::{debug, info};
use rayon::prelude::*;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::algorithms::{ordered, SimilarityAlgorithm};
use super::cache::{CacheStats, SimilarityCache};
use super::config::{CombineMethod, PipelineConfig};
use super::normalize::normalize_text;
use super::results::{BatchStatistics, NormalizationResult, SimilarityScore};
use crate::error::ConfigError;

struct Executor {
    name: &'static str,
    weight: f64,
    threshold: f64,
    algorithm: Arc<dyn SimilarityAlgorithm>,
}

/// Configuration and the algorithm instances built from it; swapped as one unit.
struct PipelineState {
    config: PipelineConfig,
    executors: Vec<Executor>,
}

impl PipelineState {
    fn build(config: PipelineConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let executors = config
            .enabled_algorithms()
            .map(|a| Executor {
                name: a.name(),
                weight: a.weight,
                threshold: a.threshold,
                algorithm: a.algorithm.build(),
            })
            .collect();
        Ok(Self { config, executors })
    }
}

/// Folds surviving scores under the configured policy. Input order does not affect
/// the result beyond floating-point summation order, which is fixed by configuration order.
fn combine(
    method: CombineMethod,
    min_similarity: f64,
    surviving: &[(&'static str, f64, f64)],
) -> SimilarityScore {
    if surviving.is_empty() {
        return SimilarityScore::abstained();
    }
    let n = surviving.len() as f64;
    let average = || surviving.iter().map(|&(_, s, _)| s).sum::<f64>() / n;

    let overall = match method {
        CombineMethod::Weighted => {
            let total_weight: f64 = surviving.iter().map(|&(_, _, w)| w).sum();
            if total_weight > 0.0 {
                surviving.iter().map(|&(_, s, w)| s * w).sum::<f64>() / total_weight
            } else {
                average()
            }
        }
        CombineMethod::Max => surviving.iter().map(|&(_, s, _)| s).fold(0.0, f64::max),
        CombineMethod::Min => surviving.iter().map(|&(_, s, _)| s).fold(1.0, f64::min),
        CombineMethod::Average => average(),
    }
    .clamp(0.0, 1.0);

    let variance = surviving
        .iter()
        .map(|&(_, s, _)| (s - overall).powi(2))
        .sum::<f64>()
        / n;

    SimilarityScore {
        scores: surviving
            .iter()
            .map(|&(name, s, _)| (name.to_string(), s))
            .collect(),
        overall_similarity: overall,
        is_duplicate: overall >= min_similarity,
        confidence: (1.0 - variance).clamp(0.0, 1.0),
    }
}

fn normalized_pair(config: &PipelineConfig, text1: &str, text2: &str) -> (String, String) {
    if config.normalize_text {
        (normalize_text(text1), normalize_text(text2))
    } else {
        (text1.to_string(), text2.to_string())
    }
}

/// Scores string pairs with every enabled algorithm and combines the results.
///
/// Safe to share across threads. `update_config` blocks until in-flight scoring
/// finishes, then swaps algorithms and clears the cache under one write lock.
pub struct SimilarityPipeline {
    state: RwLock<PipelineState>,
    cache: SimilarityCache,
}

impl SimilarityPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let state = PipelineState::build(config)?;
        let cache = SimilarityCache::new(state.config.cache_capacity, state.config.log_cache_stats);
        info!(
            "🔧 Similarity pipeline ready: {} algorithms, combine={}, min_similarity={:.2}, parallel={}, cache={}",
            state.executors.len(),
            state.config.combine_method,
            state.config.min_similarity,
            state.config.parallel_execution,
            state.config.cache_enabled
        );
        Ok(Self {
            state: RwLock::new(state),
            cache,
        })
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PipelineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the active (validated, renormalized) configuration.
    pub fn config(&self) -> PipelineConfig {
        self.read_state().config.clone()
    }

    pub fn min_similarity(&self) -> f64 {
        self.read_state().config.min_similarity
    }

    /// The form a text is scored in under the active configuration.
    pub fn normalize(&self, text: &str) -> String {
        if self.read_state().config.normalize_text {
            normalize_text(text)
        } else {
            text.to_string()
        }
    }

    pub fn score(&self, text1: &str, text2: &str) -> NormalizationResult {
        let state = self.read_state();
        let config = &state.config;

        if config.cache_enabled {
            if let Some(hit) = self.cache.get(text1, text2) {
                return hit;
            }
        }

        let start = Instant::now();
        let (normalized1, normalized2) = normalized_pair(config, text1, text2);
        let (x, y) = ordered(&normalized1, &normalized2);

        let raw: Vec<f64> = if config.parallel_execution && state.executors.len() > 1 {
            state
                .executors
                .par_iter()
                .map(|e| e.algorithm.similarity(x, y))
                .collect()
        } else {
            state
                .executors
                .iter()
                .map(|e| e.algorithm.similarity(x, y))
                .collect()
        };

        let surviving: Vec<(&'static str, f64, f64)> = state
            .executors
            .iter()
            .zip(raw)
            .filter(|(e, score)| *score >= e.threshold)
            .map(|(e, score)| (e.name, score, e.weight))
            .collect();

        let score = combine(config.combine_method, config.min_similarity, &surviving);
        let result = NormalizationResult {
            text1: text1.to_string(),
            text2: text2.to_string(),
            normalized_text1: normalized1.clone(),
            normalized_text2: normalized2.clone(),
            algorithms_used: surviving.iter().map(|&(n, _, _)| n.to_string()).collect(),
            score,
            processing_time: if config.track_processing_time {
                start.elapsed()
            } else {
                Duration::ZERO
            },
        };

        if config.cache_enabled {
            self.cache.insert(&result);
        }
        result
    }

    /// Every enabled algorithm's score before threshold abstention, in configuration
    /// order. Bypasses the cache.
    pub fn algorithm_scores(&self, text1: &str, text2: &str) -> Vec<(&'static str, f64)> {
        let state = self.read_state();
        let (normalized1, normalized2) = normalized_pair(&state.config, text1, text2);
        let (x, y) = ordered(&normalized1, &normalized2);
        state
            .executors
            .iter()
            .map(|e| (e.name, e.algorithm.similarity(x, y)))
            .collect()
    }

    /// Overall similarity only.
    pub fn similarity(&self, text1: &str, text2: &str) -> f64 {
        self.score(text1, text2).score.overall_similarity
    }

    pub fn is_duplicate(&self, text1: &str, text2: &str) -> bool {
        self.score(text1, text2).score.is_duplicate
    }

    pub fn score_batch(&self, pairs: &[(String, String)]) -> Vec<NormalizationResult> {
        pairs.iter().map(|(a, b)| self.score(a, b)).collect()
    }

    pub fn batch_statistics(&self, pairs: &[(String, String)]) -> BatchStatistics {
        let results = self.score_batch(pairs);
        let stats = BatchStatistics::from_results(&results);
        debug!(
            "Batch scored: {} pairs, {} duplicates, avg similarity {:.3}",
            stats.total, stats.duplicates, stats.average_similarity
        );
        stats
    }

    /// Validates and applies a new configuration. On error the active one is kept.
    pub fn update_config(&self, config: PipelineConfig) -> Result<(), ConfigError> {
        let next = PipelineState::build(config)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.cache
            .reset(next.config.cache_capacity, next.config.log_cache_stats);
        *state = next;
        info!(
            "🔄 Similarity pipeline reconfigured: {} algorithms, combine={}, cache cleared",
            state.executors.len(),
            state.config.combine_method
        );
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::algorithms::{AlgorithmKind, JaccardParams};
    use crate::similarity::config::AlgorithmConfig;

    fn fast_pipeline() -> SimilarityPipeline {
        SimilarityPipeline::new(PipelineConfig::fast_config()).unwrap()
    }

    #[test]
    fn test_algorithm_scores_include_abstaining_scorers() {
        let pipeline = fast_pipeline();
        let scored = pipeline.score("Болт М10", "Гайка М12");
        let raw = pipeline.algorithm_scores("Болт М10", "Гайка М12");
        let names: Vec<&str> = raw.iter().map(|&(name, _)| name).collect();
        assert_eq!(names, vec!["damerau_levenshtein", "jaccard"]);
        assert!(raw.iter().all(|&(_, s)| (0.0..=1.0).contains(&s)));
        assert!(scored.algorithms_used.len() < raw.len());
        assert_eq!(raw, pipeline.algorithm_scores("Гайка М12", "Болт М10"));
    }

    #[test]
    fn test_decimal_comma_variant_is_duplicate() {
        let pipeline = fast_pipeline();
        let result = pipeline.score("Кабель ВВГ 3x2.5", "Кабель ВВГ 3x2,5");
        assert!(result.score.is_duplicate);
        assert!(result.score.scores.contains_key("damerau_levenshtein"));
        assert!(result.score.scores.contains_key("jaccard"));
        assert_eq!(result.algorithms_used.len(), 2);
        assert_eq!(result.normalized_text1, result.normalized_text2);
    }

    #[test]
    fn test_identical_pair_is_duplicate_for_every_method() {
        for method in [
            CombineMethod::Weighted,
            CombineMethod::Max,
            CombineMethod::Min,
            CombineMethod::Average,
        ] {
            let mut config = PipelineConfig::precise_config();
            config.combine_method = method;
            config.min_similarity = 1.0;
            let pipeline = SimilarityPipeline::new(config).unwrap();
            let result = pipeline.score("ООО Ромашка", "ООО Ромашка");
            assert_eq!(result.score.overall_similarity, 1.0, "{}", method);
            assert!(result.score.is_duplicate);
            assert_eq!(result.score.confidence, 1.0);
        }
    }

    #[test]
    fn test_symmetry_without_cache() {
        let pairs = [
            ("ООО Ромашка", "Ромашка ООО"),
            ("Болт М10х50", "Болт М10x60"),
            ("Иванов Петр", "Иваноф Пётр"),
            ("", "abc"),
        ];
        for method in [
            CombineMethod::Weighted,
            CombineMethod::Max,
            CombineMethod::Min,
            CombineMethod::Average,
        ] {
            let mut config = PipelineConfig::precise_config();
            config.cache_enabled = false;
            config.combine_method = method;
            let pipeline = SimilarityPipeline::new(config).unwrap();
            for (a, b) in pairs {
                assert_eq!(pipeline.score(a, b).score, pipeline.score(b, a).score);
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut sequential = PipelineConfig::precise_config();
        sequential.parallel_execution = false;
        sequential.cache_enabled = false;
        let mut parallel = sequential.clone();
        parallel.parallel_execution = true;
        let seq = SimilarityPipeline::new(sequential).unwrap();
        let par = SimilarityPipeline::new(parallel).unwrap();
        for (a, b) in [("ООО Вектор", "ООО Векторр"), ("Гайка М8", "Гайка М10")] {
            assert_eq!(seq.score(a, b).score, par.score(a, b).score);
        }
    }

    #[test]
    fn test_no_surviving_algorithm_abstains() {
        let mut config = PipelineConfig::fast_config();
        config.min_similarity = 0.0;
        let pipeline = SimilarityPipeline::new(config).unwrap();
        let result = pipeline.score("болт", "гайка");
        assert_eq!(result.score.overall_similarity, 0.0);
        assert!(!result.score.is_duplicate);
        assert_eq!(result.score.confidence, 0.0);
        assert!(result.algorithms_used.is_empty());
    }

    #[test]
    fn test_combine_methods_and_confidence() {
        let surviving = [("a", 0.9, 0.75), ("b", 0.5, 0.25)];
        let weighted = combine(CombineMethod::Weighted, 0.75, &surviving);
        assert!((weighted.overall_similarity - 0.8).abs() < 1e-12);
        assert!(weighted.is_duplicate);
        // ((0.1)^2 + (0.3)^2) / 2 = 0.05
        assert!((weighted.confidence - 0.95).abs() < 1e-12);

        assert_eq!(combine(CombineMethod::Max, 0.8, &surviving).overall_similarity, 0.9);
        assert_eq!(combine(CombineMethod::Min, 0.8, &surviving).overall_similarity, 0.5);
        assert!((combine(CombineMethod::Average, 0.8, &surviving).overall_similarity - 0.7).abs() < 1e-12);

        let zero_weights = [("a", 0.9, 0.0), ("b", 0.5, 0.0)];
        assert!(
            (combine(CombineMethod::Weighted, 0.8, &zero_weights).overall_similarity - 0.7).abs()
                < 1e-12
        );
    }

    #[test]
    fn test_cache_hits_for_reversed_pair() {
        let pipeline = fast_pipeline();
        let first = pipeline.score("ООО Альфа", "Альфа ООО");
        let second = pipeline.score("Альфа ООО", "ООО Альфа");
        assert_eq!(first.score, second.score);
        assert_eq!(second.text1, "Альфа ООО");
        assert_eq!(pipeline.cache_stats().hits, 1);
    }

    #[test]
    fn test_update_config_invalidates_cache() {
        let pipeline = fast_pipeline();
        let before = pipeline.score("кабель медный", "кабель медный гибкий");
        assert_eq!(pipeline.cache_stats().entries, 1);

        let mut strict = PipelineConfig::fast_config();
        strict.combine_method = CombineMethod::Max;
        strict.algorithms = vec![AlgorithmConfig::new(
            AlgorithmKind::Jaccard(JaccardParams::default()),
            1.0,
            0.0,
        )];
        pipeline.update_config(strict).unwrap();
        assert_eq!(pipeline.cache_stats().entries, 0);

        let after = pipeline.score("кабель медный", "кабель медный гибкий");
        assert_ne!(before.score, after.score);
        assert!((after.score.overall_similarity - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_update_keeps_previous_config() {
        let pipeline = fast_pipeline();
        let mut broken = PipelineConfig::fast_config();
        broken.algorithms.clear();
        assert_eq!(
            pipeline.update_config(broken),
            Err(ConfigError::NoAlgorithmsEnabled)
        );
        assert_eq!(pipeline.config().algorithms.len(), 2);
    }

    #[test]
    fn test_batch_statistics() {
        let pipeline = fast_pipeline();
        let pairs = vec![
            ("ООО Ромашка".to_string(), "ООО  Ромашка".to_string()),
            ("болт".to_string(), "гайка".to_string()),
        ];
        let stats = pipeline.batch_statistics(&pairs);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.duplicates, 1);
        assert!((stats.average_similarity - 0.5).abs() < 1e-12);
    }
}
