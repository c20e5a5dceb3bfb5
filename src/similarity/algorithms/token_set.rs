// src/similarity/algorithms/token_set.rs - Token and set-overlap family scorers

use std::collections::{BTreeMap, BTreeSet};

use super::{JaccardParams, SimilarityAlgorithm, TokenParams};
use crate::similarity::normalize::tokenize;

const PAD: char = '_';

/// Unpadded character n-grams; text shorter than `n` yields itself.
pub(crate) fn char_ngrams(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() < n {
        return vec![chars.iter().collect()];
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

/// Character n-grams padded with `n - 1` markers on each side. Grams made only of
/// padding are skipped.
pub fn padded_ngrams(text: &str, n: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || n == 0 {
        return Vec::new();
    }
    let pad = n.saturating_sub(1);
    let padded: Vec<char> = std::iter::repeat(PAD)
        .take(pad)
        .chain(trimmed.to_lowercase().chars())
        .chain(std::iter::repeat(PAD).take(pad))
        .collect();
    padded
        .windows(n)
        .filter(|w| w.iter().any(|&c| c != PAD))
        .map(|w| w.iter().collect())
        .collect()
}

fn counts<I: IntoIterator<Item = String>>(items: I) -> BTreeMap<String, usize> {
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(item).or_insert(0) += 1;
    }
    map
}

fn set_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

pub struct Jaccard {
    params: JaccardParams,
}

impl Jaccard {
    pub fn new(params: JaccardParams) -> Self {
        Self { params }
    }

    fn elements(&self, text: &str) -> BTreeSet<String> {
        if self.params.use_ngrams {
            char_ngrams(&text.to_lowercase(), self.params.ngram_size)
                .into_iter()
                .collect()
        } else {
            tokenize(text).into_iter().collect()
        }
    }
}

impl SimilarityAlgorithm for Jaccard {
    fn name(&self) -> &'static str {
        "jaccard"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        set_jaccard(&self.elements(a), &self.elements(b))
    }
}

/// Dice coefficient over padded character n-gram multisets.
pub struct NGram {
    n: usize,
}

impl NGram {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }
}

impl SimilarityAlgorithm for NGram {
    fn name(&self) -> &'static str {
        "ngram"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let grams_a = counts(padded_ngrams(a, self.n));
        let grams_b = counts(padded_ngrams(b, self.n));
        let total: usize = grams_a.values().sum::<usize>() + grams_b.values().sum::<usize>();
        if total == 0 {
            return 0.0;
        }
        let common: usize = grams_a
            .iter()
            .filter_map(|(gram, &ca)| grams_b.get(gram).map(|&cb| ca.min(cb)))
            .sum();
        2.0 * common as f64 / total as f64
    }
}

/// Word-token overlap with optional tf-idf weighting or positional agreement.
pub struct TokenOverlap {
    params: TokenParams,
}

impl TokenOverlap {
    pub fn new(params: TokenParams) -> Self {
        Self { params }
    }

    /// Multiset Jaccard: sum of minimum counts over sum of maximum counts.
    fn basic(tokens_a: &[String], tokens_b: &[String]) -> f64 {
        let ca = counts(tokens_a.iter().cloned());
        let cb = counts(tokens_b.iter().cloned());
        let keys: BTreeSet<&String> = ca.keys().chain(cb.keys()).collect();
        let (mut min_sum, mut max_sum) = (0usize, 0usize);
        for key in keys {
            let x = ca.get(key).copied().unwrap_or(0);
            let y = cb.get(key).copied().unwrap_or(0);
            min_sum += x.min(y);
            max_sum += x.max(y);
        }
        if max_sum == 0 {
            0.0
        } else {
            min_sum as f64 / max_sum as f64
        }
    }

    /// Term frequency times a pair-level idf; tokens present in both texts weigh less
    /// but never zero.
    fn weighted(tokens_a: &[String], tokens_b: &[String]) -> f64 {
        let ca = counts(tokens_a.iter().cloned());
        let cb = counts(tokens_b.iter().cloned());
        let keys: BTreeSet<&String> = ca.keys().chain(cb.keys()).collect();
        let weight = |count: usize, total: usize, df: usize| -> f64 {
            if count == 0 {
                return 0.0;
            }
            let tf = count as f64 / total as f64;
            tf * (1.0 + 2.0 / df as f64).ln()
        };

        let (mut intersection, mut union) = (0.0, 0.0);
        for key in keys {
            let x = ca.get(key).copied().unwrap_or(0);
            let y = cb.get(key).copied().unwrap_or(0);
            let df = (x > 0) as usize + (y > 0) as usize;
            let wa = weight(x, tokens_a.len(), df);
            let wb = weight(y, tokens_b.len(), df);
            intersection += wa.min(wb);
            union += wa.max(wb);
        }
        if union == 0.0 {
            0.0
        } else {
            (intersection / union).clamp(0.0, 1.0)
        }
    }

    /// Mean positional agreement of shared tokens, scaled by the share of shared tokens.
    fn positional(tokens_a: &[String], tokens_b: &[String]) -> f64 {
        let mut pos_a: BTreeMap<&String, Vec<usize>> = BTreeMap::new();
        let mut pos_b: BTreeMap<&String, Vec<usize>> = BTreeMap::new();
        for (i, t) in tokens_a.iter().enumerate() {
            pos_a.entry(t).or_default().push(i);
        }
        for (i, t) in tokens_b.iter().enumerate() {
            pos_b.entry(t).or_default().push(i);
        }

        let max_len = tokens_a.len().max(tokens_b.len()) as f64;
        let union = pos_a.keys().chain(pos_b.keys()).collect::<BTreeSet<_>>().len();
        let mut total = 0.0;
        let mut shared = 0usize;
        for (token, positions_a) in &pos_a {
            let Some(positions_b) = pos_b.get(token) else {
                continue;
            };
            let min_dist = positions_a
                .iter()
                .flat_map(move |&p| positions_b.iter().map(move |&q| p.abs_diff(q)))
                .min()
                .unwrap_or(0);
            total += (1.0 - min_dist as f64 / max_len).max(0.0);
            shared += 1;
        }
        if shared == 0 || union == 0 {
            return 0.0;
        }
        (total / shared as f64) * (shared as f64 / union as f64)
    }
}

impl SimilarityAlgorithm for TokenOverlap {
    fn name(&self) -> &'static str {
        "token"
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
        if self.params.use_weighted {
            Self::weighted(&tokens_a, &tokens_b)
        } else if self.params.use_positional {
            Self::positional(&tokens_a, &tokens_b)
        } else {
            Self::basic(&tokens_a, &tokens_b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard_words() {
        let j = Jaccard::new(JaccardParams::default());
        assert_eq!(j.similarity("", "abc"), 0.0);
        assert!((j.similarity("ооо ромашка", "ромашка ооо") - 1.0).abs() < 1e-12);
        assert!((j.similarity("кабель ввг 3x2.5", "кабель ввг 3x2,5") - 0.5).abs() < 1e-12);
        // Punctuation is trimmed from word edges only.
        assert_eq!(j.similarity("ромашка, ооо", "ромашка ооо"), 1.0);
    }

    #[test]
    fn test_jaccard_ngrams() {
        let j = Jaccard::new(JaccardParams {
            use_ngrams: true,
            ngram_size: 2,
        });
        // {ab, bc} vs {ab, bd}
        assert!((j.similarity("abc", "abd") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_padded_ngrams_skip_pure_padding() {
        assert_eq!(padded_ngrams("ab", 2), vec!["_a", "ab", "b_"]);
        assert_eq!(padded_ngrams("a", 3), vec!["__a", "_a_", "a__"]);
        assert!(padded_ngrams("   ", 2).is_empty());
    }

    #[test]
    fn test_ngram_dice() {
        let ng = NGram::new(2);
        // _a ab b_ vs _a ac c_ -> 1 shared of 6
        assert!((ng.similarity("ab", "ac") - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(ng.similarity("ab", ""), 0.0);
    }

    #[test]
    fn test_token_variants() {
        let basic = TokenOverlap::new(TokenParams::default());
        assert!((basic.similarity("a b c", "a b d") - 0.5).abs() < 1e-12);

        let weighted = TokenOverlap::new(TokenParams {
            use_weighted: true,
            use_positional: false,
        });
        let w = weighted.similarity("болт м10 оцинкованный", "болт м10");
        assert!(w > 0.0 && w < 1.0);

        let positional = TokenOverlap::new(TokenParams {
            use_weighted: false,
            use_positional: true,
        });
        let same_order = positional.similarity("a b c", "a b d");
        let shuffled = positional.similarity("a b c", "c d a");
        assert!(same_order > shuffled);
    }
}
