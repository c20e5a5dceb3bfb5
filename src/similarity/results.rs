// src/similarity/results.rs - Scores and per-pair results produced by the pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    /// Only algorithms whose score met their own threshold.
    pub scores: BTreeMap<String, f64>,
    pub overall_similarity: f64,
    pub is_duplicate: bool,
    pub confidence: f64,
}

impl SimilarityScore {
    /// Result when no algorithm cleared its threshold.
    pub fn abstained() -> Self {
        Self {
            scores: BTreeMap::new(),
            overall_similarity: 0.0,
            is_duplicate: false,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub text1: String,
    pub text2: String,
    pub normalized_text1: String,
    pub normalized_text2: String,
    pub score: SimilarityScore,
    #[serde(with = "duration_micros")]
    pub processing_time: Duration,
    pub algorithms_used: Vec<String>,
}

impl NormalizationResult {
    /// Same result seen from the other side of the pair.
    pub fn swapped(&self) -> Self {
        Self {
            text1: self.text2.clone(),
            text2: self.text1.clone(),
            normalized_text1: self.normalized_text2.clone(),
            normalized_text2: self.normalized_text1.clone(),
            score: self.score.clone(),
            processing_time: self.processing_time,
            algorithms_used: self.algorithms_used.clone(),
        }
    }
}

/// Aggregate over a batch of scored pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub duplicates: usize,
    pub average_similarity: f64,
}

impl BatchStatistics {
    pub fn from_results(results: &[NormalizationResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let duplicates = results.iter().filter(|r| r.score.is_duplicate).count();
        let sum: f64 = results.iter().map(|r| r.score.overall_similarity).sum();
        Self {
            total: results.len(),
            duplicates,
            average_similarity: sum / results.len() as f64,
        }
    }
}

pub(crate) mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(d)?))
    }
}
