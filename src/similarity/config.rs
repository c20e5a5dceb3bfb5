// src/similarity/config.rs - Pipeline configuration, presets and validation

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::algorithms::{AlgorithmKind, CosineParams, JaccardParams, NGramParams, TokenParams};
use crate::error::ConfigError;
use crate::utils::constants::DEFAULT_SIMILARITY_CACHE_CAPACITY;

/// How surviving per-algorithm scores are folded into one overall similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    #[default]
    Weighted,
    Max,
    Min,
    Average,
}

impl FromStr for CombineMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" => Ok(CombineMethod::Weighted),
            "max" => Ok(CombineMethod::Max),
            "min" => Ok(CombineMethod::Min),
            "average" => Ok(CombineMethod::Average),
            other => Err(ConfigError::InvalidCombineMethod(other.to_string())),
        }
    }
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CombineMethod::Weighted => "weighted",
            CombineMethod::Max => "max",
            CombineMethod::Min => "min",
            CombineMethod::Average => "average",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub algorithm: AlgorithmKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub weight: f64,
    pub threshold: f64,
}

fn default_enabled() -> bool {
    true
}

impl AlgorithmConfig {
    pub fn new(algorithm: AlgorithmKind, weight: f64, threshold: f64) -> Self {
        Self {
            algorithm,
            enabled: true,
            weight,
            threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        self.algorithm.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub algorithms: Vec<AlgorithmConfig>,
    /// Duplicate cutoff for the overall similarity.
    pub min_similarity: f64,
    #[serde(default)]
    pub combine_method: CombineMethod,
    #[serde(default)]
    pub parallel_execution: bool,
    #[serde(default = "default_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_enabled")]
    pub normalize_text: bool,
    /// When off, `NormalizationResult::processing_time` is left at zero.
    #[serde(default = "default_enabled")]
    pub track_processing_time: bool,
    #[serde(default)]
    pub log_cache_stats: bool,
}

fn default_cache_capacity() -> usize {
    DEFAULT_SIMILARITY_CACHE_CAPACITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl PipelineConfig {
    fn with_algorithms(algorithms: Vec<AlgorithmConfig>, min_similarity: f64) -> Self {
        Self {
            algorithms,
            min_similarity,
            combine_method: CombineMethod::Weighted,
            parallel_execution: true,
            cache_enabled: true,
            cache_capacity: DEFAULT_SIMILARITY_CACHE_CAPACITY,
            normalize_text: true,
            track_processing_time: true,
            log_cache_stats: false,
        }
    }

    /// Balanced mix of edit, set, vector and n-gram signals.
    pub fn default_config() -> Self {
        Self::with_algorithms(
            vec![
                AlgorithmConfig::new(AlgorithmKind::DamerauLevenshtein, 0.3, 0.85),
                AlgorithmConfig::new(AlgorithmKind::Jaccard(JaccardParams::default()), 0.2, 0.75),
                AlgorithmConfig::new(AlgorithmKind::JaroWinkler, 0.2, 0.85),
                AlgorithmConfig::new(AlgorithmKind::NGram(NGramParams::default()), 0.15, 0.7),
                AlgorithmConfig::new(AlgorithmKind::Cosine(CosineParams::default()), 0.15, 0.7),
            ],
            0.85,
        )
    }

    /// Two cheap algorithms; suited to large batches.
    pub fn fast_config() -> Self {
        Self::with_algorithms(
            vec![
                AlgorithmConfig::new(AlgorithmKind::DamerauLevenshtein, 0.5, 0.85),
                AlgorithmConfig::new(AlgorithmKind::Jaccard(JaccardParams::default()), 0.5, 0.75),
            ],
            0.85,
        )
    }

    /// Every algorithm enabled with a stricter cutoff.
    pub fn precise_config() -> Self {
        Self::with_algorithms(
            vec![
                AlgorithmConfig::new(AlgorithmKind::DamerauLevenshtein, 0.2, 0.85),
                AlgorithmConfig::new(AlgorithmKind::Lcs, 0.05, 0.8),
                AlgorithmConfig::new(AlgorithmKind::Jaro, 0.05, 0.85),
                AlgorithmConfig::new(AlgorithmKind::JaroWinkler, 0.15, 0.85),
                AlgorithmConfig::new(
                    AlgorithmKind::Jaccard(JaccardParams {
                        use_ngrams: true,
                        ngram_size: 3,
                    }),
                    0.1,
                    0.7,
                ),
                AlgorithmConfig::new(AlgorithmKind::NGram(NGramParams { n: 3 }), 0.1, 0.7),
                AlgorithmConfig::new(
                    AlgorithmKind::Token(TokenParams {
                        use_weighted: true,
                        use_positional: false,
                    }),
                    0.1,
                    0.6,
                ),
                AlgorithmConfig::new(AlgorithmKind::Cosine(CosineParams::default()), 0.15, 0.7),
                AlgorithmConfig::new(AlgorithmKind::Soundex, 0.05, 0.75),
                AlgorithmConfig::new(AlgorithmKind::Metaphone, 0.05, 0.8),
            ],
            0.9,
        )
    }

    /// Resolves a preset by name (`default`, `fast`, `precise`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "default" => Some(Self::default_config()),
            "fast" => Some(Self::fast_config()),
            "precise" => Some(Self::precise_config()),
            _ => None,
        }
    }

    pub fn enabled_algorithms(&self) -> impl Iterator<Item = &AlgorithmConfig> {
        self.algorithms.iter().filter(|a| a.enabled)
    }

    /// Checks every invariant and renormalizes enabled weights to sum to 1.0.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.enabled_algorithms().next().is_none() {
            return Err(ConfigError::NoAlgorithmsEnabled);
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(ConfigError::InvalidMinSimilarity(self.min_similarity));
        }

        let mut seen = HashSet::new();
        for algo in self.enabled_algorithms() {
            let name = algo.name();
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateAlgorithm(name.to_string()));
            }
            if !(0.0..=1.0).contains(&algo.weight) {
                return Err(ConfigError::InvalidWeight {
                    algorithm: name.to_string(),
                    weight: algo.weight,
                });
            }
            if !(0.0..=1.0).contains(&algo.threshold) {
                return Err(ConfigError::InvalidThreshold {
                    algorithm: name.to_string(),
                    threshold: algo.threshold,
                });
            }
            algo.algorithm.validate()?;
        }

        let total: f64 = self.enabled_algorithms().map(|a| a.weight).sum();
        if total > 0.0 {
            for algo in self.algorithms.iter_mut().filter(|a| a.enabled) {
                algo.weight /= total;
            }
        }
        debug!(
            "Validated pipeline config: {} enabled algorithms, combine={}, min_similarity={:.2}",
            seen.len(),
            self.combine_method,
            self.min_similarity
        );
        Ok(())
    }

    /// Copy with the weights of the named algorithms replaced. Algorithms missing
    /// from `weights` keep theirs; unknown names are ignored.
    pub fn with_weights(&self, weights: &BTreeMap<String, f64>) -> Self {
        let mut config = self.clone();
        for algo in config.algorithms.iter_mut() {
            if let Some(&weight) = weights.get(algo.name()) {
                algo.weight = weight;
            }
        }
        config
    }

    /// Consuming variant of [`validate`](Self::validate).
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for name in ["default", "fast", "precise"] {
            let config = PipelineConfig::preset(name).unwrap().validated().unwrap();
            let total: f64 = config.enabled_algorithms().map(|a| a.weight).sum();
            assert!((total - 1.0).abs() < 1e-9, "{} weights sum to {}", name, total);
        }
        assert!(PipelineConfig::preset("turbo").is_none());
    }

    #[test]
    fn test_weights_renormalized() {
        let mut config = PipelineConfig::fast_config();
        config.algorithms[0].weight = 0.2;
        config.algorithms[1].weight = 0.6;
        config.validate().unwrap();
        assert!((config.algorithms[0].weight - 0.25).abs() < 1e-12);
        assert!((config.algorithms[1].weight - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_with_weights_overrides_by_name() {
        let weights = BTreeMap::from([
            ("jaccard".to_string(), 0.9),
            ("soundex".to_string(), 0.4),
        ]);
        let config = PipelineConfig::fast_config().with_weights(&weights);
        let jaccard = config.algorithms.iter().find(|a| a.name() == "jaccard").unwrap();
        assert_eq!(jaccard.weight, 0.9);
        let dl = config.algorithms.iter().find(|a| a.name() == "damerau_levenshtein").unwrap();
        assert_eq!(dl.weight, 0.5);
        assert_eq!(config.algorithms.len(), 2);
    }

    #[test]
    fn test_disabled_algorithms_ignored() {
        let mut config = PipelineConfig::fast_config();
        config.algorithms[1].enabled = false;
        config.algorithms[1].weight = 5.0;
        config.validate().unwrap();
        assert_eq!(config.algorithms[0].weight, 1.0);
        assert_eq!(config.algorithms[1].weight, 5.0);
    }

    #[test]
    fn test_validation_errors() {
        let mut none_enabled = PipelineConfig::fast_config();
        none_enabled.algorithms.iter_mut().for_each(|a| a.enabled = false);
        assert_eq!(none_enabled.validate(), Err(ConfigError::NoAlgorithmsEnabled));

        let mut bad_weight = PipelineConfig::fast_config();
        bad_weight.algorithms[0].weight = 1.5;
        assert!(matches!(
            bad_weight.validate(),
            Err(ConfigError::InvalidWeight { .. })
        ));

        let mut bad_threshold = PipelineConfig::fast_config();
        bad_threshold.algorithms[1].threshold = -0.1;
        assert!(matches!(
            bad_threshold.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let mut bad_min = PipelineConfig::fast_config();
        bad_min.min_similarity = f64::NAN;
        assert!(matches!(
            bad_min.validate(),
            Err(ConfigError::InvalidMinSimilarity(_))
        ));

        let mut duplicate = PipelineConfig::fast_config();
        duplicate
            .algorithms
            .push(AlgorithmConfig::new(AlgorithmKind::DamerauLevenshtein, 0.1, 0.5));
        assert_eq!(
            duplicate.validate(),
            Err(ConfigError::DuplicateAlgorithm("damerau_levenshtein".to_string()))
        );
    }

    #[test]
    fn test_combine_method_parsing() {
        assert_eq!("Weighted".parse::<CombineMethod>(), Ok(CombineMethod::Weighted));
        assert_eq!(" max ".parse::<CombineMethod>(), Ok(CombineMethod::Max));
        assert_eq!(
            "median".parse::<CombineMethod>(),
            Err(ConfigError::InvalidCombineMethod("median".to_string()))
        );
    }

    #[test]
    fn test_config_json_round_trip_with_defaults() {
        let json = r#"{
            "algorithms": [
                {"algorithm": {"kind": "damerau_levenshtein"}, "weight": 0.5, "threshold": 0.85},
                {"algorithm": {"kind": "jaccard", "use_ngrams": true}, "weight": 0.5, "threshold": 0.75}
            ],
            "min_similarity": 0.85,
            "combine_method": "max"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.combine_method, CombineMethod::Max);
        assert!(config.cache_enabled);
        assert!(!config.parallel_execution);
        assert_eq!(
            config.algorithms[1].algorithm,
            AlgorithmKind::Jaccard(JaccardParams {
                use_ngrams: true,
                ngram_size: 2
            })
        );
    }
}
