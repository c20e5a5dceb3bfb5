// src/evaluation/analyzer.rs - Per-pair score breakdowns, distribution statistics and tuning hints

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::evaluator::{compare_results, evaluate_pipelines, EvaluationResult, LabeledPair};
use crate::error::ConfigError;
use crate::similarity::{PipelineConfig, SimilarityPipeline};

/// Distance from the threshold at which a decision counts as fully confident.
const CONFIDENT_MARGIN: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAnalysis {
    pub text1: String,
    pub text2: String,
    pub similarity: f64,
    pub is_duplicate: bool,
    /// 0.0 on the threshold, 1.0 at least `CONFIDENT_MARGIN` away from it.
    pub confidence: f64,
    /// Raw score of every enabled algorithm, abstaining ones included.
    pub breakdown: BTreeMap<String, f64>,
    /// Algorithms that cleared their own threshold.
    pub algorithms_used: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub total: usize,
    pub duplicates: usize,
    pub non_duplicates: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl AnalysisStatistics {
    pub fn from_pairs(pairs: &[PairAnalysis]) -> Self {
        if pairs.is_empty() {
            return Self::default();
        }
        let mut similarities: Vec<f64> = pairs.iter().map(|p| p.similarity).collect();
        similarities.sort_by(f64::total_cmp);
        let n = similarities.len();
        let median = if n % 2 == 0 {
            (similarities[n / 2 - 1] + similarities[n / 2]) / 2.0
        } else {
            similarities[n / 2]
        };
        let duplicates = pairs.iter().filter(|p| p.is_duplicate).count();
        Self {
            total: n,
            duplicates,
            non_duplicates: n - duplicates,
            average: similarities.iter().sum::<f64>() / n as f64,
            min: similarities[0],
            max: similarities[n - 1],
            median,
        }
    }

    pub fn duplicate_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.duplicates as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Duplicate cutoff the pairs were judged against.
    pub threshold: f64,
    pub pairs: Vec<PairAnalysis>,
    pub statistics: AnalysisStatistics,
    pub recommendations: Vec<String>,
}

/// Tuning hints derived from the score distribution.
pub(crate) fn recommendations(stats: &AnalysisStatistics, threshold: f64) -> Vec<String> {
    if stats.total == 0 {
        return vec!["No pairs to analyze.".to_string()];
    }
    let mut hints = Vec::new();

    let rate = stats.duplicate_rate();
    if rate > 0.5 {
        hints.push(format!(
            "High duplicate rate ({:.1}%). Check the quality of the source data.",
            rate * 100.0
        ));
    } else if rate < 0.1 {
        hints.push(format!(
            "Low duplicate rate ({:.1}%). The similarity threshold may be too high.",
            rate * 100.0
        ));
    }

    if stats.average < threshold - 0.1 {
        hints.push(format!(
            "Average similarity ({:.2}) is well below the threshold ({:.2}). Consider lowering the threshold.",
            stats.average, threshold
        ));
    } else if stats.average > threshold + 0.1 {
        hints.push(format!(
            "Average similarity ({:.2}) is well above the threshold ({:.2}). Consider raising the threshold to cut false positives.",
            stats.average, threshold
        ));
    }

    let spread = stats.max - stats.min;
    if spread < 0.3 {
        hints.push("Narrow similarity spread. The data may be too uniform.".to_string());
    } else if spread > 0.8 {
        hints.push("Wide similarity spread. Heterogeneous data makes duplicates harder to separate.".to_string());
    }

    if stats.median < threshold {
        hints.push("Median similarity is below the threshold. Most pairs are not duplicates.".to_string());
    }

    if hints.is_empty() {
        hints.push("Statistics look normal.".to_string());
    }
    hints
}

/// Explains how a pipeline configuration judges a set of pairs.
pub struct SimilarityAnalyzer {
    pipeline: SimilarityPipeline,
}

impl SimilarityAnalyzer {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pipeline: SimilarityPipeline::new(config)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.pipeline.min_similarity()
    }

    pub fn analyze_pair(&self, text1: &str, text2: &str) -> PairAnalysis {
        let result = self.pipeline.score(text1, text2);
        let similarity = result.score.overall_similarity;
        PairAnalysis {
            text1: text1.to_string(),
            text2: text2.to_string(),
            similarity,
            is_duplicate: result.score.is_duplicate,
            confidence: ((similarity - self.threshold()).abs() / CONFIDENT_MARGIN).min(1.0),
            breakdown: self
                .pipeline
                .algorithm_scores(text1, text2)
                .into_iter()
                .map(|(name, score)| (name.to_string(), score))
                .collect(),
            algorithms_used: result.algorithms_used,
        }
    }

    pub fn analyze_pairs(&self, pairs: &[(String, String)]) -> AnalysisReport {
        let analyses: Vec<PairAnalysis> = pairs
            .par_iter()
            .map(|(a, b)| self.analyze_pair(a, b))
            .collect();
        let statistics = AnalysisStatistics::from_pairs(&analyses);
        let threshold = self.threshold();
        info!(
            "🔍 Analyzed {} pairs: {} duplicates, average {:.3}, median {:.3}",
            statistics.total, statistics.duplicates, statistics.average, statistics.median
        );
        AnalysisReport {
            threshold,
            recommendations: recommendations(&statistics, threshold),
            pairs: analyses,
            statistics,
        }
    }

    /// Duplicate pairs only, most similar first.
    pub fn find_similar_pairs(&self, pairs: &[(String, String)]) -> Vec<PairAnalysis> {
        let mut similar: Vec<PairAnalysis> = self
            .analyze_pairs(pairs)
            .pairs
            .into_iter()
            .filter(|p| p.is_duplicate)
            .collect();
        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar
    }

    /// Evaluates this configuration under each named weight set, best F1 first.
    pub fn compare_weights(
        &self,
        pairs: &[LabeledPair],
        weight_sets: &[(String, BTreeMap<String, f64>)],
    ) -> Result<Vec<EvaluationResult>, ConfigError> {
        let base = self.pipeline.config();
        let configs: Vec<(String, PipelineConfig)> = weight_sets
            .iter()
            .map(|(name, weights)| (name.clone(), base.with_weights(weights)))
            .collect();
        Ok(compare_results(evaluate_pipelines(pairs, &configs)?))
    }
}
