// src/clustering/candidate_index.rs - Key bucket index narrowing pairwise comparison

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::similarity::algorithms::token_set::{char_ngrams, padded_ngrams};
use crate::similarity::algorithms::AlgorithmKind;
use crate::similarity::config::{CombineMethod, PipelineConfig};
use crate::similarity::normalize::tokenize;

/// Bucket shared by every text without word tokens, the empty text included.
const EMPTY_KEY: &str = "";
const TOKEN_PREFIX: &str = "=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIndexConfig {
    /// Characters per n-gram key.
    #[serde(default = "default_key_length")]
    pub key_length: usize,
}

fn default_key_length() -> usize {
    2
}

impl Default for CandidateIndexConfig {
    fn default() -> Self {
        Self {
            key_length: default_key_length(),
        }
    }
}

impl CandidateIndexConfig {
    fn key_length(&self) -> usize {
        self.key_length.max(1)
    }

    /// True when `kind` scores zero on every pair of texts that share no key.
    pub fn covers(&self, kind: &AlgorithmKind) -> bool {
        let k = self.key_length();
        match kind {
            AlgorithmKind::Jaccard(params) => !params.use_ngrams || params.ngram_size >= k,
            AlgorithmKind::NGram(params) => params.n >= k,
            AlgorithmKind::Token(_) | AlgorithmKind::Cosine(_) => true,
            AlgorithmKind::DamerauLevenshtein
            | AlgorithmKind::Lcs
            | AlgorithmKind::Jaro
            | AlgorithmKind::JaroWinkler
            | AlgorithmKind::Soundex
            | AlgorithmKind::Metaphone => false,
        }
    }

    /// True when `pipeline` cannot call a pair a duplicate unless the two texts share
    /// a key, so scoring bucket mates only finds every pair a full scan finds.
    ///
    /// Covered algorithms score zero on a keyless pair and abstain unless their
    /// threshold is zero. The remaining algorithms are assumed to score 1.0 there.
    pub fn is_exhaustive_for(&self, pipeline: &PipelineConfig) -> bool {
        if pipeline.min_similarity <= 0.0 {
            return false;
        }
        let mut open = Vec::new();
        let mut zeroed = Vec::new();
        for algorithm in pipeline.enabled_algorithms() {
            if !self.covers(&algorithm.algorithm) {
                open.push(algorithm.weight);
            } else if algorithm.threshold <= 0.0 {
                zeroed.push(algorithm.weight);
            }
        }
        if open.is_empty() {
            return true;
        }
        if zeroed.is_empty() {
            return false;
        }

        let best_keyless_score = match pipeline.combine_method {
            CombineMethod::Max => 1.0,
            CombineMethod::Min => 0.0,
            CombineMethod::Average => open.len() as f64 / (open.len() + zeroed.len()) as f64,
            CombineMethod::Weighted => {
                let open_weight: f64 = open.iter().sum();
                let zeroed_weight: f64 = zeroed.iter().sum();
                if zeroed_weight > 0.0 {
                    open_weight / (open_weight + zeroed_weight)
                } else {
                    1.0
                }
            }
        };
        best_keyless_score < pipeline.min_similarity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub buckets: usize,
    pub max_bucket: usize,
    pub mean_bucket: f64,
}

/// Maps short keys derived from normalized text to the records carrying them.
/// Sharing a bucket is necessary, not sufficient: candidates must still be scored.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    config: CandidateIndexConfig,
    buckets: HashMap<String, Vec<usize>>,
    record_keys: HashMap<usize, Vec<String>>,
}

impl CandidateIndex {
    pub fn new(config: CandidateIndexConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
            record_keys: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CandidateIndexConfig {
        &self.config
    }

    /// Indexes `texts` under their positions.
    pub fn build(texts: &[String], config: CandidateIndexConfig) -> Self {
        let mut index = Self::new(config);
        for (i, text) in texts.iter().enumerate() {
            index.insert(i, text);
        }
        index
    }

    /// Keys in order of first appearance, deduplicated.
    ///
    /// Plain and edge-padded character n-grams of the lowercased text, each word
    /// token, and the empty key for texts without tokens. Built from the same
    /// helpers the overlap scorers use, so their notion of "shared" matches.
    pub fn keys_for(&self, text: &str) -> Vec<String> {
        let k = self.config.key_length();
        let mut seen = BTreeSet::new();
        let mut keys = Vec::new();
        let mut push = |key: String| {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        };

        for gram in char_ngrams(&text.to_lowercase(), k) {
            push(gram);
        }
        for gram in padded_ngrams(text, k) {
            push(gram);
        }
        let tokens = tokenize(text);
        if tokens.is_empty() {
            push(EMPTY_KEY.to_string());
        }
        for token in tokens {
            push(format!("{}{}", TOKEN_PREFIX, token));
        }
        keys
    }

    /// Adds (or re-adds) a record. Buckets stay sorted by record index.
    pub fn insert(&mut self, record: usize, text: &str) {
        self.remove(record);
        let keys = self.keys_for(text);
        for key in &keys {
            let bucket = self.buckets.entry(key.clone()).or_default();
            if let Err(pos) = bucket.binary_search(&record) {
                bucket.insert(pos, record);
            }
        }
        self.record_keys.insert(record, keys);
    }

    /// Returns false when the record was not indexed.
    pub fn remove(&mut self, record: usize) -> bool {
        let Some(keys) = self.record_keys.remove(&record) else {
            return false;
        };
        for key in keys {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                if let Ok(pos) = bucket.binary_search(&record) {
                    bucket.remove(pos);
                }
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
        true
    }

    fn union_of<'k>(&self, keys: impl Iterator<Item = &'k String>) -> BTreeSet<usize> {
        keys.filter_map(|k| self.buckets.get(k))
            .flat_map(|bucket| bucket.iter().copied())
            .collect()
    }

    /// Indexed records sharing at least one key with `text`, ascending.
    pub fn candidates(&self, text: &str) -> Vec<usize> {
        let keys = self.keys_for(text);
        self.union_of(keys.iter()).into_iter().collect()
    }

    /// Candidates for an indexed record, excluding itself. Empty when not indexed.
    pub fn candidates_for(&self, record: usize) -> Vec<usize> {
        let Some(keys) = self.record_keys.get(&record) else {
            return Vec::new();
        };
        self.union_of(keys.iter())
            .into_iter()
            .filter(|&other| other != record)
            .collect()
    }

    pub fn contains(&self, record: usize) -> bool {
        self.record_keys.contains_key(&record)
    }

    pub fn len(&self) -> usize {
        self.record_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_keys.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let sizes = self.buckets.values().map(Vec::len);
        let total: usize = sizes.clone().sum();
        IndexStats {
            records: self.record_keys.len(),
            buckets: self.buckets.len(),
            max_bucket: sizes.max().unwrap_or(0),
            mean_bucket: if self.buckets.is_empty() {
                0.0
            } else {
                total as f64 / self.buckets.len() as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::algorithms::{JaccardParams, NGramParams, TokenParams};
    use crate::similarity::config::AlgorithmConfig;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pipeline(algorithms: Vec<AlgorithmConfig>, combine_method: CombineMethod, min: f64) -> PipelineConfig {
        let mut config = PipelineConfig::fast_config();
        config.algorithms = algorithms;
        config.combine_method = combine_method;
        config.min_similarity = min;
        config
    }

    #[test]
    fn test_keys() {
        let index = CandidateIndex::new(CandidateIndexConfig::default());
        assert_eq!(index.keys_for("abab"), vec!["ab", "ba", "_a", "b_", "=abab"]);
        assert_eq!(index.keys_for("A"), vec!["a", "_a", "a_", "=a"]);
        assert_eq!(index.keys_for(""), vec![""]);
        assert_eq!(index.keys_for("!!"), vec!["!!", "_!", "!_", ""]);
    }

    #[test]
    fn test_candidates_share_a_bucket() {
        let index = CandidateIndex::build(&texts(&["ромашка", "ромашки", "василек", ""]), Default::default());
        assert_eq!(index.candidates_for(0), vec![1]);
        assert!(index.candidates_for(2).is_empty());
        assert_eq!(index.candidates(""), vec![3]);
        assert_eq!(index.candidates("машина"), vec![0, 1]);
    }

    #[test]
    fn test_overlap_scorers_only_match_bucket_mates() {
        // Shared single-letter word, shared leading letter, and two token-free texts.
        let pairs = [("«a»", "a"), ("a", "ab"), ("!!!", "???"), ("", "...")];
        let index = CandidateIndex::new(CandidateIndexConfig::default());
        for (a, b) in pairs {
            let ka: BTreeSet<String> = index.keys_for(a).into_iter().collect();
            let kb: BTreeSet<String> = index.keys_for(b).into_iter().collect();
            assert!(ka.intersection(&kb).next().is_some(), "{:?} / {:?}", a, b);
        }
    }

    #[test]
    fn test_covers_overlap_family_only() {
        let config = CandidateIndexConfig::default();
        assert!(config.covers(&AlgorithmKind::Jaccard(JaccardParams::default())));
        assert!(config.covers(&AlgorithmKind::NGram(NGramParams { n: 3 })));
        assert!(config.covers(&AlgorithmKind::Token(TokenParams::default())));
        assert!(!config.covers(&AlgorithmKind::NGram(NGramParams { n: 1 })));
        assert!(!config.covers(&AlgorithmKind::Jaro));
        assert!(!config.covers(&AlgorithmKind::Soundex));

        let trigram = CandidateIndexConfig { key_length: 3 };
        assert!(!trigram.covers(&AlgorithmKind::NGram(NGramParams { n: 2 })));
    }

    #[test]
    fn test_exhaustiveness_depends_on_pipeline() {
        let config = CandidateIndexConfig::default();
        let jaccard = || AlgorithmConfig::new(AlgorithmKind::Jaccard(JaccardParams::default()), 0.5, 0.0);
        let jaro = || AlgorithmConfig::new(AlgorithmKind::Jaro, 0.5, 0.0);

        assert!(config.is_exhaustive_for(&pipeline(vec![jaccard()], CombineMethod::Average, 0.5)));
        assert!(!config.is_exhaustive_for(&pipeline(vec![jaccard()], CombineMethod::Average, 0.0)));
        assert!(!config.is_exhaustive_for(&pipeline(vec![jaro()], CombineMethod::Weighted, 0.8)));

        // Jaro alone can reach at most half of the weighted score on a keyless pair.
        let mixed = vec![jaccard(), jaro()];
        assert!(config.is_exhaustive_for(&pipeline(mixed.clone(), CombineMethod::Weighted, 0.6)));
        assert!(!config.is_exhaustive_for(&pipeline(mixed.clone(), CombineMethod::Weighted, 0.5)));
        assert!(!config.is_exhaustive_for(&pipeline(mixed.clone(), CombineMethod::Max, 0.9)));
        assert!(config.is_exhaustive_for(&pipeline(mixed, CombineMethod::Min, 0.1)));

        // A covered scorer with a threshold abstains on a keyless pair instead of pulling it down.
        let gated = vec![
            AlgorithmConfig::new(AlgorithmKind::Jaccard(JaccardParams::default()), 0.5, 0.7),
            jaro(),
        ];
        assert!(!config.is_exhaustive_for(&pipeline(gated, CombineMethod::Weighted, 0.9)));

        for preset in [
            PipelineConfig::default_config(),
            PipelineConfig::fast_config(),
            PipelineConfig::precise_config(),
        ] {
            assert!(!config.is_exhaustive_for(&preset));
        }
    }

    #[test]
    fn test_insert_remove_and_stats() {
        let mut index = CandidateIndex::new(CandidateIndexConfig::default());
        index.insert(0, "abc");
        index.insert(1, "abd");
        assert_eq!(index.len(), 2);
        let stats = index.stats();
        assert_eq!(stats.records, 2);
        // ab bc bd _a c_ d_ =abc =abd
        assert_eq!(stats.buckets, 8);
        assert_eq!(stats.max_bucket, 2);

        assert!(index.remove(0));
        assert!(!index.remove(0));
        assert!(!index.contains(0));
        assert!(index.candidates_for(1).is_empty());
        assert_eq!(index.stats().buckets, 5);

        // Re-inserting replaces the previous keys.
        index.insert(1, "xyz");
        assert!(index.candidates("abd").is_empty());
        assert_eq!(index.candidates("xy"), vec![1]);
    }
}
