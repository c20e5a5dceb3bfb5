// src/similarity/cache.rs - Symmetric, capacity-bounded result cache owned by one pipeline

use log::debug;
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use super::results::NormalizationResult;

const STATS_LOG_EVERY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    pub hit_rate: f64,
}

/// Results are stored in canonical (lexicographically sorted) pair order and
/// re-oriented on lookup, so `(a, b)` and `(b, a)` share one entry.
///
/// Reads use `peek` under the read lock, so recency is insertion order.
pub struct SimilarityCache {
    entries: RwLock<LruCache<String, NormalizationResult>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    log_stats: AtomicBool,
}

impl SimilarityCache {
    pub fn new(capacity: usize, log_stats: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!("Initializing SimilarityCache with capacity: {}", capacity);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            log_stats: AtomicBool::new(log_stats),
        }
    }

    /// Digest of the canonical pair; fixed size regardless of text length.
    pub fn pair_key(a: &str, b: &str) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(lo.as_bytes());
        hasher.update([0x1f]);
        hasher.update(hi.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, a: &str, b: &str) -> Option<NormalizationResult> {
        let key = Self::pair_key(a, b);
        let found = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.peek(&key).cloned()
        };
        match found {
            Some(result) => {
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                if self.log_stats.load(Ordering::Relaxed) && hits % STATS_LOG_EVERY == 0 {
                    let stats = self.stats();
                    debug!(
                        "💾 Similarity cache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                        stats.hits,
                        stats.misses,
                        stats.hit_rate * 100.0
                    );
                }
                if result.text1 == a {
                    Some(result)
                } else {
                    Some(result.swapped())
                }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, result: &NormalizationResult) {
        let key = Self::pair_key(&result.text1, &result.text2);
        let canonical = if result.text1 <= result.text2 {
            result.clone()
        } else {
            result.swapped()
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.put(key, canonical);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Drops every entry and applies a new capacity, used on reconfiguration.
    pub fn reset(&self, capacity: usize, log_stats: bool) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        entries.resize(capacity);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.log_stats.store(log_stats, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            entries: self.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::results::SimilarityScore;
    use std::time::Duration;

    fn result(a: &str, b: &str) -> NormalizationResult {
        NormalizationResult {
            text1: a.to_string(),
            text2: b.to_string(),
            normalized_text1: a.to_lowercase(),
            normalized_text2: b.to_lowercase(),
            score: SimilarityScore::abstained(),
            processing_time: Duration::from_micros(5),
            algorithms_used: vec![],
        }
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(
            SimilarityCache::pair_key("alpha", "beta"),
            SimilarityCache::pair_key("beta", "alpha")
        );
        // Separator keeps concatenation ambiguity out of the key.
        assert_ne!(
            SimilarityCache::pair_key("ab", "c"),
            SimilarityCache::pair_key("a", "bc")
        );
    }

    #[test]
    fn test_lookup_is_reoriented() {
        let cache = SimilarityCache::new(10, false);
        cache.insert(&result("Zeta", "Alpha"));
        let hit = cache.get("Zeta", "Alpha").unwrap();
        assert_eq!(hit.text1, "Zeta");
        assert_eq!(hit.normalized_text2, "alpha");
        let reversed = cache.get("Alpha", "Zeta").unwrap();
        assert_eq!(reversed.text1, "Alpha");
        assert_eq!(reversed.normalized_text1, "alpha");
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_capacity_and_clear() {
        let cache = SimilarityCache::new(2, false);
        cache.insert(&result("a", "b"));
        cache.insert(&result("c", "d"));
        cache.insert(&result("e", "f"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "b").is_none());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }
}
