// src/similarity/algorithms/vector.rs - Vector/frequency family scorer

use std::collections::{BTreeMap, BTreeSet};

use super::{CosineParams, SimilarityAlgorithm};
use crate::similarity::normalize::tokenize;

type TermVector = BTreeMap<String, f64>;

pub struct Cosine {
    params: CosineParams,
}

impl Cosine {
    pub fn new(params: CosineParams) -> Self {
        Self { params }
    }

    fn term_counts(tokens: &[String]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for token in tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Builds both vectors at once since tf-idf needs document frequencies over the pair.
    fn vectors(&self, tokens_a: &[String], tokens_b: &[String]) -> (TermVector, TermVector) {
        let counts_a = Self::term_counts(tokens_a);
        let counts_b = Self::term_counts(tokens_b);

        if self.params.use_binary {
            let binary = |c: &BTreeMap<String, usize>| -> TermVector {
                c.keys().map(|k| (k.clone(), 1.0)).collect()
            };
            return (binary(&counts_a), binary(&counts_b));
        }

        if !self.params.use_tfidf {
            let raw = |c: &BTreeMap<String, usize>| -> TermVector {
                c.iter().map(|(k, &v)| (k.clone(), v as f64)).collect()
            };
            return (raw(&counts_a), raw(&counts_b));
        }

        let documents = 2.0;
        let idf = |term: &String| -> f64 {
            let df = counts_a.contains_key(term) as usize + counts_b.contains_key(term) as usize;
            ((documents + 1.0) / (df as f64 + 1.0)).ln() + 1.0
        };
        let tfidf = |counts: &BTreeMap<String, usize>, len: usize| -> TermVector {
            counts
                .iter()
                .map(|(term, &count)| (term.clone(), count as f64 / len as f64 * idf(term)))
                .collect()
        };
        (
            tfidf(&counts_a, tokens_a.len()),
            tfidf(&counts_b, tokens_b.len()),
        )
    }
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let terms: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for term in terms {
        let x = a.get(term).copied().unwrap_or(0.0);
        let y = b.get(term).copied().unwrap_or(0.0);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

impl SimilarityAlgorithm for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let tokens_a = tokenize(a);
        let tokens_b = tokenize(b);
        if tokens_a.is_empty() && tokens_b.is_empty() {
            return 1.0;
        }
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return 0.0;
        }
        let (va, vb) = self.vectors(&tokens_a, &tokens_b);
        cosine(&va, &vb)
    }
}
