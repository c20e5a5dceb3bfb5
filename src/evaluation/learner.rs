// src/evaluation/learner.rs - Algorithm weight learning, threshold fitting and k-fold cross-validation

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::evaluator::{best_threshold, evaluate, EvaluationResult, LabeledPair};
use super::metrics::{ConfusionMatrix, Metrics};
use crate::error::EvaluationError;
use crate::similarity::{CombineMethod, PipelineConfig, SimilarityPipeline};
use crate::utils::env::env_or;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Upper bound on weight updates; learning stops early once no pair is misclassified.
    pub iterations: usize,
    pub learning_rate: f64,
    /// Cutoff deciding which pairs count as misclassified while fitting. The reported
    /// threshold is searched separately once the weights are fixed.
    pub training_threshold: f64,
    pub folds: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            training_threshold: 0.75,
            folds: 5,
        }
    }
}

impl LearnerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            iterations: env_or("LEARNER_ITERATIONS", defaults.iterations),
            learning_rate: env_or("LEARNER_LEARNING_RATE", defaults.learning_rate),
            training_threshold: env_or("LEARNER_TRAINING_THRESHOLD", defaults.training_threshold),
            folds: env_or("LEARNER_FOLDS", defaults.folds),
        }
    }

    pub fn log_config(&self) {
        info!("🧠 Learner Configuration:");
        info!(
            "   Iterations: {}, learning rate: {}, training threshold: {:.2}, folds: {}",
            self.iterations, self.learning_rate, self.training_threshold, self.folds
        );
    }

    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.iterations == 0 {
            return Err(EvaluationError::invalid_parameter("iterations", 0.0, "must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(EvaluationError::invalid_parameter(
                "learning rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.training_threshold) {
            return Err(EvaluationError::invalid_parameter(
                "training threshold",
                self.training_threshold,
                "must be within [0, 1]",
            ));
        }
        if self.folds < 2 {
            return Err(EvaluationError::invalid_parameter(
                "fold count",
                self.folds as f64,
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedWeights {
    /// Algorithm name to weight. Weights sum to 1.0.
    pub weights: BTreeMap<String, f64>,
    /// Best-F1 cutoff for the learned blend on the training pairs.
    pub threshold: f64,
    pub training: Metrics,
    /// Weight updates performed.
    pub iterations: usize,
}

impl LearnedWeights {
    /// Pipeline scoring pairs the way the weights were learned: weighted combination,
    /// no abstention, duplicates at the fitted threshold.
    pub fn apply_to(&self, base: &PipelineConfig) -> PipelineConfig {
        let mut config = base.with_weights(&self.weights);
        for algo in config.algorithms.iter_mut() {
            algo.threshold = 0.0;
        }
        config.combine_method = CombineMethod::Weighted;
        config.min_similarity = self.threshold;
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub train_pairs: usize,
    pub test_pairs: usize,
    /// Learned on the other folds.
    pub weights: LearnedWeights,
    /// This fold's pairs scored at `weights.threshold`.
    pub matrix: ConfusionMatrix,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub folds: Vec<FoldResult>,
    pub pooled: ConfusionMatrix,
    pub average: Metrics,
}

/// Metrics of the fold matrices pooled into one. Same ratios as averaging the
/// counts across folds, without rounding them.
pub fn average_metrics(matrices: &[ConfusionMatrix]) -> Metrics {
    let mut pooled = ConfusionMatrix::default();
    for matrix in matrices {
        pooled.merge(matrix);
    }
    Metrics::from(&pooled)
}

/// Raw per-algorithm scores of one labeled pair, in configuration order.
#[derive(Debug, Clone)]
struct Sample {
    scores: Vec<f64>,
    is_duplicate: bool,
}

fn blend(weights: &[f64], scores: &[f64]) -> f64 {
    weights
        .iter()
        .zip(scores)
        .map(|(w, s)| w * s)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Rescales to sum 1.0; all-zero weights become uniform.
fn normalize(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    } else if !weights.is_empty() {
        let uniform = 1.0 / weights.len() as f64;
        weights.fill(uniform);
    }
}

/// Fits the weights of a pipeline's enabled algorithms to labeled pairs.
///
/// Every pair is scored once by every algorithm when it is added. Learning then
/// runs gradient steps on the misclassified pairs only: a missed duplicate moves
/// weight towards the algorithms that scored it high, a false match moves weight
/// away from them.
pub struct SimilarityLearner {
    base: PipelineConfig,
    pipeline: SimilarityPipeline,
    names: Vec<&'static str>,
    initial: Vec<f64>,
    config: LearnerConfig,
    samples: Vec<Sample>,
}

impl SimilarityLearner {
    /// Learning starts from the (renormalized) weights of `base`.
    pub fn new(base: PipelineConfig, config: LearnerConfig) -> Result<Self, EvaluationError> {
        config.validate()?;
        let base = base.validated()?;
        let pipeline = SimilarityPipeline::new(PipelineConfig {
            cache_enabled: false,
            parallel_execution: false,
            track_processing_time: false,
            ..base.clone()
        })?;
        let (names, initial): (Vec<&'static str>, Vec<f64>) =
            base.enabled_algorithms().map(|a| (a.name(), a.weight)).unzip();
        Ok(Self {
            base,
            pipeline,
            names,
            initial,
            config,
            samples: Vec::new(),
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn base(&self) -> &PipelineConfig {
        &self.base
    }

    pub fn algorithm_names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn raw_scores(&self, text1: &str, text2: &str) -> Vec<f64> {
        self.pipeline
            .algorithm_scores(text1, text2)
            .into_iter()
            .map(|(_, score)| score)
            .collect()
    }

    pub fn add_pair(&mut self, pair: &LabeledPair) {
        let scores = self.raw_scores(&pair.text1, &pair.text2);
        self.samples.push(Sample {
            scores,
            is_duplicate: pair.is_duplicate,
        });
    }

    pub fn add_pairs(&mut self, pairs: &[LabeledPair]) {
        let samples: Vec<Sample> = pairs
            .par_iter()
            .map(|pair| Sample {
                scores: self.raw_scores(&pair.text1, &pair.text2),
                is_duplicate: pair.is_duplicate,
            })
            .collect();
        self.samples.extend(samples);
    }

    fn fit(&self, samples: &[Sample]) -> Result<LearnedWeights, EvaluationError> {
        if samples.is_empty() {
            return Err(EvaluationError::NoTrainingPairs);
        }
        let count = samples.len() as f64;
        let mut weights = self.initial.clone();
        let mut iterations = 0;

        while iterations < self.config.iterations {
            let mut gradient = vec![0.0; weights.len()];
            for sample in samples {
                let blended = blend(&weights, &sample.scores);
                if (blended >= self.config.training_threshold) == sample.is_duplicate {
                    continue;
                }
                // Negative for a missed duplicate.
                let error = blended - if sample.is_duplicate { 1.0 } else { 0.0 };
                for (g, score) in gradient.iter_mut().zip(&sample.scores) {
                    *g += error * score;
                }
            }
            if gradient.iter().all(|&g| g == 0.0) {
                break;
            }
            for (w, g) in weights.iter_mut().zip(&gradient) {
                *w = (*w - self.config.learning_rate * g / count).clamp(0.0, 1.0);
            }
            normalize(&mut weights);
            iterations += 1;
        }

        let scored: Vec<(f64, bool)> = samples
            .iter()
            .map(|s| (blend(&weights, &s.scores), s.is_duplicate))
            .collect();
        let (threshold, matrix) = best_threshold(&scored);
        debug!(
            "Fitted {} pairs in {} iterations: threshold {:.2}, F1={:.3}",
            samples.len(),
            iterations,
            threshold,
            matrix.f1()
        );

        Ok(LearnedWeights {
            weights: self
                .names
                .iter()
                .map(|name| name.to_string())
                .zip(weights)
                .collect(),
            threshold,
            training: Metrics::from(&matrix),
            iterations,
        })
    }

    pub fn optimize_weights(&self) -> Result<LearnedWeights, EvaluationError> {
        let start = Instant::now();
        let learned = self.fit(&self.samples)?;
        info!(
            "🧠 Learned weights on {} pairs in {} iterations ({:.2?}): threshold {:.2}, F1={:.3}",
            self.samples.len(),
            learned.iterations,
            start.elapsed(),
            learned.threshold,
            learned.training.f1
        );
        for (name, weight) in &learned.weights {
            debug!("   {}: {:.3}", name, weight);
        }
        Ok(learned)
    }

    /// Weights in configuration order; names missing from `learned` keep their starting weight.
    fn weight_vector(&self, learned: &LearnedWeights) -> Vec<f64> {
        let mut weights: Vec<f64> = self
            .names
            .iter()
            .zip(&self.initial)
            .map(|(name, &initial)| learned.weights.get(*name).copied().unwrap_or(initial))
            .collect();
        normalize(&mut weights);
        weights
    }

    /// Best-F1 threshold for `learned` over every added pair.
    pub fn optimal_threshold(&self, learned: &LearnedWeights) -> (f64, ConfusionMatrix) {
        let weights = self.weight_vector(learned);
        let scored: Vec<(f64, bool)> = self
            .samples
            .iter()
            .map(|s| (blend(&weights, &s.scores), s.is_duplicate))
            .collect();
        best_threshold(&scored)
    }

    /// Scores `pairs` with the learned blend at the learned threshold.
    pub fn evaluate(&self, learned: &LearnedWeights, pairs: &[LabeledPair]) -> EvaluationResult {
        let weights = self.weight_vector(learned);
        evaluate(
            "learned",
            pairs,
            |a, b| blend(&weights, &self.raw_scores(a, b)),
            learned.threshold,
        )
    }

    /// Splits the added pairs into contiguous folds in insertion order, the last fold
    /// taking the remainder. Each fold is scored with weights and a threshold learned
    /// on the other folds. Shuffle the pairs first if they are grouped by label.
    pub fn cross_validate(&self) -> Result<CrossValidation, EvaluationError> {
        let folds = self.config.folds;
        let total = self.samples.len();
        if total < folds {
            return Err(EvaluationError::NotEnoughPairs { pairs: total, folds });
        }
        let start = Instant::now();
        let fold_size = total / folds;

        let mut results = Vec::with_capacity(folds);
        for fold in 0..folds {
            let test_start = fold * fold_size;
            let test_end = if fold + 1 == folds {
                total
            } else {
                test_start + fold_size
            };
            let train: Vec<Sample> = self.samples[..test_start]
                .iter()
                .chain(&self.samples[test_end..])
                .cloned()
                .collect();

            let learned = self.fit(&train)?;
            let weights = self.weight_vector(&learned);
            let mut matrix = ConfusionMatrix::default();
            for sample in &self.samples[test_start..test_end] {
                matrix.record(blend(&weights, &sample.scores) >= learned.threshold, sample.is_duplicate);
            }
            debug!(
                "Fold {}/{}: {} train, {} test, threshold {:.2}, F1={:.3}",
                fold + 1,
                folds,
                train.len(),
                test_end - test_start,
                learned.threshold,
                matrix.f1()
            );
            results.push(FoldResult {
                fold,
                train_pairs: train.len(),
                test_pairs: test_end - test_start,
                weights: learned,
                metrics: Metrics::from(&matrix),
                matrix,
            });
        }

        let matrices: Vec<ConfusionMatrix> = results.iter().map(|f| f.matrix).collect();
        let mut pooled = ConfusionMatrix::default();
        for matrix in &matrices {
            pooled.merge(matrix);
        }
        let average = average_metrics(&matrices);
        info!(
            "🔁 {}-fold cross-validation on {} pairs in {:.2?}: P={:.3} R={:.3} F1={:.3}",
            folds,
            total,
            start.elapsed(),
            average.precision,
            average.recall,
            average.f1
        );

        Ok(CrossValidation {
            folds: results,
            pooled,
            average,
        })
    }
}
