// src/evaluation/evaluator.rs - Labeled-pair evaluation, threshold search and ranking

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use super::metrics::{ConfusionMatrix, Metrics};
use crate::error::ConfigError;
use crate::similarity::results::duration_micros;
use crate::similarity::{PipelineConfig, SimilarityPipeline};

const THRESHOLD_SCAN_START: u32 = 50;
const THRESHOLD_SCAN_END: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPair {
    pub text1: String,
    pub text2: String,
    pub is_duplicate: bool,
}

impl LabeledPair {
    pub fn new(text1: impl Into<String>, text2: impl Into<String>, is_duplicate: bool) -> Self {
        Self {
            text1: text1.into(),
            text2: text2.into(),
            is_duplicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub name: String,
    /// Fixed threshold, or the mean per-pair threshold for adaptive runs.
    pub threshold: f64,
    pub matrix: ConfusionMatrix,
    pub metrics: Metrics,
    #[serde(with = "duration_micros")]
    pub total_time: Duration,
    pub items_per_second: f64,
}

impl EvaluationResult {
    pub(crate) fn new(name: &str, threshold: f64, matrix: ConfusionMatrix, total_time: Duration) -> Self {
        let secs = total_time.as_secs_f64();
        Self {
            name: name.to_string(),
            threshold,
            metrics: Metrics::from(&matrix),
            items_per_second: if secs > 0.0 {
                matrix.total() as f64 / secs
            } else {
                0.0
            },
            matrix,
            total_time,
        }
    }
}

/// Predicts a duplicate when `similarity(pair) >= threshold`.
pub fn evaluate<F>(name: &str, pairs: &[LabeledPair], similarity: F, threshold: f64) -> EvaluationResult
where
    F: Fn(&str, &str) -> f64,
{
    evaluate_with_adaptive_threshold(name, pairs, similarity, |_| threshold)
}

/// Like [`evaluate`], with the threshold chosen per pair.
pub fn evaluate_with_adaptive_threshold<F, T>(
    name: &str,
    pairs: &[LabeledPair],
    similarity: F,
    threshold_for: T,
) -> EvaluationResult
where
    F: Fn(&str, &str) -> f64,
    T: Fn(&LabeledPair) -> f64,
{
    let start = Instant::now();
    let mut matrix = ConfusionMatrix::default();
    let mut threshold_sum = 0.0;
    for pair in pairs {
        let threshold = threshold_for(pair);
        threshold_sum += threshold;
        let predicted = similarity(&pair.text1, &pair.text2) >= threshold;
        matrix.record(predicted, pair.is_duplicate);
    }
    let mean_threshold = if pairs.is_empty() {
        0.0
    } else {
        threshold_sum / pairs.len() as f64
    };
    let result = EvaluationResult::new(name, mean_threshold, matrix, start.elapsed());
    debug!(
        "Evaluated '{}' on {} pairs: P={:.3} R={:.3} F1={:.3}",
        name,
        pairs.len(),
        result.metrics.precision,
        result.metrics.recall,
        result.metrics.f1
    );
    result
}

/// Scans thresholds 0.50..=1.00 in steps of 0.01 over pre-scored `(score, actual)`
/// pairs and keeps the best F1. The lowest threshold wins ties.
pub(crate) fn best_threshold(scored: &[(f64, bool)]) -> (f64, ConfusionMatrix) {
    let mut best: Option<(f64, ConfusionMatrix)> = None;
    for step in THRESHOLD_SCAN_START..=THRESHOLD_SCAN_END {
        let threshold = f64::from(step) / 100.0;
        let mut matrix = ConfusionMatrix::default();
        for &(score, actual) in scored {
            matrix.record(score >= threshold, actual);
        }
        let better = match &best {
            Some((_, current)) => matrix.f1() > current.f1(),
            None => true,
        };
        if better {
            best = Some((threshold, matrix));
        }
    }
    best.unwrap_or((f64::from(THRESHOLD_SCAN_START) / 100.0, ConfusionMatrix::default()))
}

/// Scores every pair once, then keeps the threshold with the best F1
/// (see [`best_threshold`]).
pub fn find_optimal_threshold<F>(name: &str, pairs: &[LabeledPair], similarity: F) -> EvaluationResult
where
    F: Fn(&str, &str) -> f64,
{
    let start = Instant::now();
    let scored: Vec<(f64, bool)> = pairs
        .iter()
        .map(|p| (similarity(&p.text1, &p.text2), p.is_duplicate))
        .collect();
    let scoring_time = start.elapsed();

    let (threshold, matrix) = best_threshold(&scored);
    let result = EvaluationResult::new(name, threshold, matrix, scoring_time);
    info!(
        "🎯 Optimal threshold for '{}': {:.2} (F1={:.3}, P={:.3}, R={:.3})",
        name, threshold, result.metrics.f1, result.metrics.precision, result.metrics.recall
    );
    result
}

/// Evaluates each named pipeline configuration at its own `min_similarity`.
/// Fails on the first invalid configuration.
pub fn evaluate_pipelines(
    pairs: &[LabeledPair],
    configs: &[(String, PipelineConfig)],
) -> Result<Vec<EvaluationResult>, ConfigError> {
    configs
        .iter()
        .map(|(name, config)| {
            let pipeline = SimilarityPipeline::new(config.clone())?;
            let threshold = pipeline.min_similarity();
            Ok(evaluate(name, pairs, |a, b| pipeline.similarity(a, b), threshold))
        })
        .collect()
}

fn by_f1_desc(a: &EvaluationResult, b: &EvaluationResult) -> Ordering {
    b.metrics.f1.total_cmp(&a.metrics.f1)
}

/// Ranks by F1, best first. Equal F1 keeps the input order.
pub fn compare_results(mut results: Vec<EvaluationResult>) -> Vec<EvaluationResult> {
    results.sort_by(by_f1_desc);
    results
}

/// Highest F1, earliest on ties; `None` for no results.
pub fn best_algorithm(results: &[EvaluationResult]) -> Option<&EvaluationResult> {
    results.iter().fold(None, |best: Option<&EvaluationResult>, r| match best {
        Some(b) if by_f1_desc(b, r) != Ordering::Greater => Some(b),
        _ => Some(r),
    })
}

/// Plain-text ranking table.
pub fn generate_report(results: &[EvaluationResult]) -> String {
    let ranked = compare_results(results.to_vec());
    let mut out = String::new();
    let _ = writeln!(out, "=== Similarity Algorithm Evaluation ===");
    if ranked.is_empty() {
        let _ = writeln!(out, "No results.");
        return out;
    }
    let _ = writeln!(
        out,
        "{:<4} {:<28} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>12}",
        "#", "Configuration", "Threshold", "Precision", "Recall", "F1", "F2", "Accuracy", "Pairs/s"
    );
    for (rank, r) in ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<4} {:<28} {:>9.2} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>12.0}",
            rank + 1,
            r.name,
            r.threshold,
            r.metrics.precision,
            r.metrics.recall,
            r.metrics.f1,
            r.metrics.f2,
            r.metrics.accuracy,
            r.items_per_second
        );
    }
    if let Some(best) = ranked.first() {
        let m = &best.matrix;
        let _ = writeln!(
            out,
            "Best: {} (TP={}, TN={}, FP={}, FN={})",
            best.name, m.true_positives, m.true_negatives, m.false_positives, m.false_negatives
        );
    }
    out
}
