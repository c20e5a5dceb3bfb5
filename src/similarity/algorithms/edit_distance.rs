// src/similarity/algorithms/edit_distance.rs - Edit-distance family scorers

use std::collections::HashMap;
use strsim::{jaro, jaro_winkler};

use super::{ordered, SimilarityAlgorithm};

/// Unrestricted Damerau-Levenshtein distance over chars (adjacent transpositions
/// may be combined with further edits).
pub fn damerau_levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (len_a, len_b) = (a.len(), b.len());
    if len_a == 0 {
        return len_b;
    }
    if len_b == 0 {
        return len_a;
    }

    let max_dist = len_a + len_b;
    let width = len_b + 2;
    // (len_a + 2) x (len_b + 2) matrix with a sentinel row and column.
    let mut d = vec![0usize; (len_a + 2) * width];
    let idx = |i: usize, j: usize| i * width + j;

    d[idx(0, 0)] = max_dist;
    for i in 0..=len_a {
        d[idx(i + 1, 0)] = max_dist;
        d[idx(i + 1, 1)] = i;
    }
    for j in 0..=len_b {
        d[idx(0, j + 1)] = max_dist;
        d[idx(1, j + 1)] = j;
    }

    let mut last_row: HashMap<char, usize> = HashMap::new();
    for i in 1..=len_a {
        let mut last_match_col = 0;
        for j in 1..=len_b {
            let i1 = last_row.get(&b[j - 1]).copied().unwrap_or(0);
            let j1 = last_match_col;
            let cost = if a[i - 1] == b[j - 1] {
                last_match_col = j;
                0
            } else {
                1
            };

            let substitution = d[idx(i, j)] + cost;
            let insertion = d[idx(i + 1, j)] + 1;
            let deletion = d[idx(i, j + 1)] + 1;
            let transposition = d[idx(i1, j1)] + (i - i1 - 1) + 1 + (j - j1 - 1);

            d[idx(i + 1, j + 1)] = substitution.min(insertion).min(deletion).min(transposition);
        }
        last_row.insert(a[i - 1], i);
    }

    d[idx(len_a + 1, len_b + 1)]
}

pub struct DamerauLevenshtein;

impl SimilarityAlgorithm for DamerauLevenshtein {
    fn name(&self) -> &'static str {
        "damerau_levenshtein"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 1.0;
        }
        let distance = damerau_levenshtein_distance(a, b);
        (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
    }
}

/// Length of the longest common subsequence, two-row dynamic programming.
pub fn lcs_length(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

pub struct LongestCommonSubsequence;

impl SimilarityAlgorithm for LongestCommonSubsequence {
    fn name(&self) -> &'static str {
        "lcs"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let total = a.chars().count() + b.chars().count();
        if total == 0 {
            return 1.0;
        }
        2.0 * lcs_length(a, b) as f64 / total as f64
    }
}

pub struct Jaro;

impl SimilarityAlgorithm for Jaro {
    fn name(&self) -> &'static str {
        "jaro"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let (x, y) = ordered(a, b);
        jaro(x, y).clamp(0.0, 1.0)
    }
}

pub struct JaroWinkler;

impl SimilarityAlgorithm for JaroWinkler {
    fn name(&self) -> &'static str {
        "jaro_winkler"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let (x, y) = ordered(a, b);
        jaro_winkler(x, y).clamp(0.0, 1.0)
    }
}
