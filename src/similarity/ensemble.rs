// src/similarity/ensemble.rs - Voting over raw algorithm scores, without per-algorithm abstention

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::config::PipelineConfig;
use super::pipeline::SimilarityPipeline;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Mean of the scores at or above the threshold when they are a strict majority, else 0.0.
    Majority,
    #[default]
    Average,
    Max,
    Min,
}

impl FromStr for VotingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "majority" => Ok(VotingStrategy::Majority),
            "average" => Ok(VotingStrategy::Average),
            "max" => Ok(VotingStrategy::Max),
            "min" => Ok(VotingStrategy::Min),
            other => Err(ConfigError::InvalidVotingStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VotingStrategy::Majority => "majority",
            VotingStrategy::Average => "average",
            VotingStrategy::Max => "max",
            VotingStrategy::Min => "min",
        };
        f.write_str(name)
    }
}

/// Folds raw scores under `strategy`. Empty input scores 0.0.
pub fn vote(strategy: VotingStrategy, threshold: f64, scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    match strategy {
        VotingStrategy::Average => mean(scores),
        VotingStrategy::Max => scores.iter().copied().fold(0.0, f64::max),
        VotingStrategy::Min => scores.iter().copied().fold(1.0, f64::min),
        VotingStrategy::Majority => {
            let votes: Vec<f64> = scores.iter().copied().filter(|&s| s >= threshold).collect();
            if votes.len() > scores.len() / 2 {
                mean(&votes)
            } else {
                0.0
            }
        }
    }
}

/// Scores every enabled algorithm of a configuration and lets them vote.
/// Weights and per-algorithm thresholds are ignored; `min_similarity` is both
/// the vote cutoff and the match cutoff.
pub struct EnsembleMatcher {
    pipeline: SimilarityPipeline,
    strategy: VotingStrategy,
    threshold: f64,
}

impl EnsembleMatcher {
    pub fn new(config: PipelineConfig, strategy: VotingStrategy) -> Result<Self, ConfigError> {
        let threshold = config.min_similarity;
        let pipeline = SimilarityPipeline::new(PipelineConfig {
            cache_enabled: false,
            ..config
        })?;
        Ok(Self {
            pipeline,
            strategy,
            threshold,
        })
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    pub fn similarity(&self, text1: &str, text2: &str) -> f64 {
        let scores: Vec<f64> = self
            .pipeline
            .algorithm_scores(text1, text2)
            .into_iter()
            .map(|(_, score)| score)
            .collect();
        vote(self.strategy, self.threshold, &scores)
    }

    pub fn is_match(&self, text1: &str, text2: &str) -> bool {
        self.similarity(text1, text2) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::algorithms::AlgorithmKind;
    use crate::similarity::AlgorithmConfig;

    #[test]
    fn test_vote_strategies() {
        let scores = [0.9, 0.8, 0.2];
        assert!((vote(VotingStrategy::Average, 0.75, &scores) - 0.6333).abs() < 1e-3);
        assert_eq!(vote(VotingStrategy::Max, 0.75, &scores), 0.9);
        assert_eq!(vote(VotingStrategy::Min, 0.75, &scores), 0.2);
        assert!((vote(VotingStrategy::Majority, 0.75, &scores) - 0.85).abs() < 1e-9);
        // Half is not a majority.
        assert_eq!(vote(VotingStrategy::Majority, 0.75, &[0.9, 0.1]), 0.0);
        assert_eq!(vote(VotingStrategy::Max, 0.75, &[]), 0.0);
    }

    #[test]
    fn test_ensemble_over_pipeline_algorithms() {
        let mut config = PipelineConfig::fast_config();
        config.algorithms.push(AlgorithmConfig::new(AlgorithmKind::Lcs, 0.5, 0.99));

        // Edit distance and LCS both give 0.875, token overlap gives 0.0.
        let majority = EnsembleMatcher::new(config.clone(), VotingStrategy::Majority).unwrap();
        assert!((majority.similarity("abcdefgh", "abcdefgx") - 0.875).abs() < 1e-9);
        assert!(majority.is_match("abcdefgh", "abcdefgx"));

        let min = EnsembleMatcher::new(config, VotingStrategy::Min).unwrap();
        assert_eq!(min.similarity("abcdefgh", "abcdefgx"), 0.0);
        assert!(!min.is_match("abcdefgh", "abcdefgx"));
        assert_eq!(min.similarity("Ромашка", "ромашка"), 1.0);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!("Majority".parse::<VotingStrategy>().unwrap(), VotingStrategy::Majority);
        assert_eq!(VotingStrategy::Min.to_string(), "min");
        assert!("median".parse::<VotingStrategy>().is_err());
    }
}
