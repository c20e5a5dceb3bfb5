// src/clustering/mod.rs - Candidate generation and duplicate clustering

pub mod candidate_index;
pub mod engine;

pub use candidate_index::{CandidateIndex, CandidateIndexConfig, IndexStats};
pub use engine::{
    ClusterRecord, ClusterType, ClusteringConfig, ClusteringEngine, ClusteringOutcome,
    ClusteringStats, DuplicateCluster,
};
