// src/similarity/algorithms/mod.rs - Similarity algorithm registry and typed parameters

pub mod edit_distance;
pub mod phonetic;
pub mod token_set;
pub mod vector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;

/// A stateless scorer mapping a pair of normalized strings to [0, 1].
/// Implementations must be symmetric and return 1.0 for identical input.
pub trait SimilarityAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;
    fn similarity(&self, a: &str, b: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JaccardParams {
    #[serde(default)]
    pub use_ngrams: bool,
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
}

impl Default for JaccardParams {
    fn default() -> Self {
        Self {
            use_ngrams: false,
            ngram_size: default_ngram_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NGramParams {
    #[serde(default = "default_ngram_size")]
    pub n: usize,
}

impl Default for NGramParams {
    fn default() -> Self {
        Self { n: default_ngram_size() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CosineParams {
    #[serde(default = "default_true")]
    pub use_tfidf: bool,
    #[serde(default)]
    pub use_binary: bool,
}

impl Default for CosineParams {
    fn default() -> Self {
        Self {
            use_tfidf: true,
            use_binary: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenParams {
    #[serde(default)]
    pub use_weighted: bool,
    #[serde(default)]
    pub use_positional: bool,
}

fn default_ngram_size() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Every supported algorithm together with its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlgorithmKind {
    DamerauLevenshtein,
    Lcs,
    Jaro,
    JaroWinkler,
    Jaccard(JaccardParams),
    #[serde(rename = "ngram")]
    NGram(NGramParams),
    Token(TokenParams),
    Cosine(CosineParams),
    Soundex,
    Metaphone,
}

impl AlgorithmKind {
    /// Stable name used as the key in `SimilarityScore::scores`.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::DamerauLevenshtein => "damerau_levenshtein",
            AlgorithmKind::Lcs => "lcs",
            AlgorithmKind::Jaro => "jaro",
            AlgorithmKind::JaroWinkler => "jaro_winkler",
            AlgorithmKind::Jaccard(_) => "jaccard",
            AlgorithmKind::NGram(_) => "ngram",
            AlgorithmKind::Token(_) => "token",
            AlgorithmKind::Cosine(_) => "cosine",
            AlgorithmKind::Soundex => "soundex",
            AlgorithmKind::Metaphone => "metaphone",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            AlgorithmKind::Jaccard(p) if p.use_ngrams && p.ngram_size == 0 => Err(
                ConfigError::invalid_parameter(self.name(), "ngram_size must be at least 1"),
            ),
            AlgorithmKind::NGram(p) if p.n == 0 => Err(ConfigError::invalid_parameter(
                self.name(),
                "n must be at least 1",
            )),
            _ => Ok(()),
        }
    }

    /// Instantiates the scorer. Parameters are assumed validated.
    pub fn build(&self) -> Arc<dyn SimilarityAlgorithm> {
        match *self {
            AlgorithmKind::DamerauLevenshtein => Arc::new(edit_distance::DamerauLevenshtein),
            AlgorithmKind::Lcs => Arc::new(edit_distance::LongestCommonSubsequence),
            AlgorithmKind::Jaro => Arc::new(edit_distance::Jaro),
            AlgorithmKind::JaroWinkler => Arc::new(edit_distance::JaroWinkler),
            AlgorithmKind::Jaccard(params) => Arc::new(token_set::Jaccard::new(params)),
            AlgorithmKind::NGram(params) => Arc::new(token_set::NGram::new(params.n)),
            AlgorithmKind::Token(params) => Arc::new(token_set::TokenOverlap::new(params)),
            AlgorithmKind::Cosine(params) => Arc::new(vector::Cosine::new(params)),
            AlgorithmKind::Soundex => Arc::new(phonetic::Soundex),
            AlgorithmKind::Metaphone => Arc::new(phonetic::Metaphone),
        }
    }

    /// All kinds with default parameters, in registry order.
    pub fn all() -> Vec<AlgorithmKind> {
        vec![
            AlgorithmKind::DamerauLevenshtein,
            AlgorithmKind::Lcs,
            AlgorithmKind::Jaro,
            AlgorithmKind::JaroWinkler,
            AlgorithmKind::Jaccard(JaccardParams::default()),
            AlgorithmKind::NGram(NGramParams::default()),
            AlgorithmKind::Token(TokenParams::default()),
            AlgorithmKind::Cosine(CosineParams::default()),
            AlgorithmKind::Soundex,
            AlgorithmKind::Metaphone,
        ]
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orders a pair so that asymmetric library scorers see the same argument order
/// regardless of call order.
pub(crate) fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[(&str, &str)] = &[
        ("кабель ввг 3x2.5", "кабель ввг 3x2.5 нг"),
        ("ооо ромашка", "ромашка ооо"),
        ("martha", "marhta"),
        ("", "abc"),
        ("болт м10", "болт м12"),
        ("иванов", "иваноф"),
    ];

    #[test]
    fn test_identical_inputs_score_one() {
        for kind in AlgorithmKind::all() {
            let algorithm = kind.build();
            for text in ["", "a", "кабель ввг 3x2.5", "ООО Ромашка"] {
                assert_eq!(
                    algorithm.similarity(text, text),
                    1.0,
                    "{} on {:?}",
                    kind,
                    text
                );
            }
        }
    }

    #[test]
    fn test_all_algorithms_symmetric_and_bounded() {
        for kind in AlgorithmKind::all() {
            let algorithm = kind.build();
            for (a, b) in SAMPLES {
                let ab = algorithm.similarity(a, b);
                let ba = algorithm.similarity(b, a);
                assert_eq!(ab, ba, "{} not symmetric on {:?}/{:?}", kind, a, b);
                assert!((0.0..=1.0).contains(&ab), "{} out of range: {}", kind, ab);
            }
        }
    }

    #[test]
    fn test_kind_serde_uses_tag() {
        let kind = AlgorithmKind::Jaccard(JaccardParams {
            use_ngrams: true,
            ngram_size: 3,
        });
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"jaccard\""));
        let back: AlgorithmKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);

        let parsed: AlgorithmKind = serde_json::from_str(r#"{"kind":"ngram"}"#).unwrap();
        assert_eq!(parsed, AlgorithmKind::NGram(NGramParams { n: 2 }));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(AlgorithmKind::NGram(NGramParams { n: 0 }).validate().is_err());
        assert!(AlgorithmKind::Jaccard(JaccardParams {
            use_ngrams: true,
            ngram_size: 0
        })
        .validate()
        .is_err());
        assert!(AlgorithmKind::Soundex.validate().is_ok());
    }
}
