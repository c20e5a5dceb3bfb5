// src/clustering/engine.rs - Seed-based duplicate clustering over the similarity pipeline

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::candidate_index::{CandidateIndex, CandidateIndexConfig};
use crate::similarity::results::duration_micros;
use crate::similarity::SimilarityPipeline;
use crate::utils::constants::DEFAULT_CANCEL_CHECK_INTERVAL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub use_candidate_index: bool,
    #[serde(default)]
    pub index: CandidateIndexConfig,
    /// Seeds processed between two stop checks.
    pub cancel_check_interval: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            use_candidate_index: true,
            index: CandidateIndexConfig::default(),
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Every member has the same normalized text.
    Exact,
    Fuzzy,
}

/// Input to clustering. `index` is the caller's record reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub index: usize,
    pub text: String,
    /// Data completeness used to pick the master; higher wins.
    pub completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub id: usize,
    /// Caller record references in input order; always at least two.
    pub members: Vec<usize>,
    pub master: usize,
    /// Lowest pairwise overall similarity inside the cluster.
    pub confidence: f64,
    pub cluster_type: ClusterType,
}

impl DuplicateCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, record: usize) -> bool {
        self.members.contains(&record)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringStats {
    pub records: usize,
    pub comparisons: usize,
    pub clusters: usize,
    /// Records placed in some cluster.
    pub duplicates: usize,
    /// True when comparisons were narrowed by the candidate index.
    #[serde(default)]
    pub indexed: bool,
    #[serde(with = "duration_micros")]
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    pub clusters: Vec<DuplicateCluster>,
    pub stats: ClusteringStats,
    /// True when a stop request ended clustering early; clusters found so far are kept.
    pub interrupted: bool,
}

/// Groups records into duplicate clusters.
///
/// Records are consumed in input order. Each unassigned record seeds a cluster
/// with every later unassigned record that directly matches it; matches are not
/// chained through third records. The candidate index only narrows which later
/// records are scored.
pub struct ClusteringEngine {
    pipeline: Arc<SimilarityPipeline>,
    config: ClusteringConfig,
}

impl ClusteringEngine {
    pub fn new(pipeline: Arc<SimilarityPipeline>, config: ClusteringConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<SimilarityPipeline> {
        &self.pipeline
    }

    /// Whether clustering narrows comparisons through the candidate index. The index
    /// is skipped when the pipeline could match two records that share no key.
    pub fn index_applies(&self) -> bool {
        if !self.config.use_candidate_index {
            return false;
        }
        let exhaustive = self.config.index.is_exhaustive_for(&self.pipeline.config());
        if !exhaustive {
            debug!("Candidate index skipped: enabled algorithms can match records sharing no key");
        }
        exhaustive
    }

    pub fn cluster(&self, records: &[ClusterRecord]) -> ClusteringOutcome {
        self.cluster_with_stop(records, &|| false)
    }

    pub fn cluster_with_stop(
        &self,
        records: &[ClusterRecord],
        should_stop: &dyn Fn() -> bool,
    ) -> ClusteringOutcome {
        let start = Instant::now();
        let n = records.len();
        let check_every = self.config.cancel_check_interval.max(1);

        let normalized: Vec<String> = records.iter().map(|r| self.pipeline.normalize(&r.text)).collect();
        let mut index = self
            .index_applies()
            .then(|| CandidateIndex::build(&normalized, self.config.index.clone()));
        if let Some(index) = &index {
            let stats = index.stats();
            debug!(
                "Candidate index built: {} records, {} buckets, max bucket {}, mean bucket {:.1}",
                stats.records, stats.buckets, stats.max_bucket, stats.mean_bucket
            );
        }

        let mut assigned = vec![false; n];
        let mut clusters = Vec::new();
        let mut comparisons = 0usize;
        let mut interrupted = false;

        for seed in 0..n {
            if seed > 0 && seed % check_every == 0 && should_stop() {
                interrupted = true;
                break;
            }
            if assigned[seed] {
                continue;
            }

            let later: Vec<usize> = match &index {
                Some(index) => index
                    .candidates_for(seed)
                    .into_iter()
                    .filter(|&j| j > seed)
                    .collect(),
                None => (seed + 1..n).collect(),
            };

            let mut members = vec![seed];
            let mut seed_scores = Vec::new();
            for j in later {
                if assigned[j] {
                    continue;
                }
                comparisons += 1;
                let result = self.pipeline.score(&records[seed].text, &records[j].text);
                if result.score.is_duplicate {
                    members.push(j);
                    seed_scores.push(result.score.overall_similarity);
                }
            }
            if members.len() < 2 {
                continue;
            }

            for &m in &members {
                assigned[m] = true;
                if let Some(index) = index.as_mut() {
                    index.remove(m);
                }
            }

            // Seed pairs are already scored; the remaining pairs come from the cache when enabled.
            let mut confidence = seed_scores.iter().copied().fold(1.0, f64::min);
            for (a, &x) in members.iter().enumerate().skip(1) {
                for &y in &members[a + 1..] {
                    comparisons += 1;
                    confidence = confidence.min(self.pipeline.similarity(&records[x].text, &records[y].text));
                }
            }

            let cluster_type = if members.iter().all(|&m| normalized[m] == normalized[seed]) {
                ClusterType::Exact
            } else {
                ClusterType::Fuzzy
            };

            let mut master = members[0];
            for &m in &members[1..] {
                if records[m].completeness > records[master].completeness {
                    master = m;
                }
            }

            clusters.push(DuplicateCluster {
                id: clusters.len(),
                members: members.iter().map(|&m| records[m].index).collect(),
                master: records[master].index,
                confidence,
                cluster_type,
            });
        }

        let duplicates = clusters.iter().map(DuplicateCluster::len).sum();
        let stats = ClusteringStats {
            records: n,
            comparisons,
            clusters: clusters.len(),
            duplicates,
            indexed: index.is_some(),
            duration: start.elapsed(),
        };
        info!(
            "🧩 Clustering {}: {} records, {} comparisons, {} clusters covering {} records in {:.2?}",
            if interrupted { "interrupted" } else { "complete" },
            stats.records,
            stats.comparisons,
            stats.clusters,
            stats.duplicates,
            stats.duration
        );

        ClusteringOutcome {
            clusters,
            stats,
            interrupted,
        }
    }
}
