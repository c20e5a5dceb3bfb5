// src/similarity/mod.rs - String similarity algorithms and the combining pipeline

pub mod algorithms;
pub mod cache;
pub mod config;
pub mod ensemble;
pub mod normalize;
pub mod pipeline;
pub mod results;

pub use algorithms::{AlgorithmKind, SimilarityAlgorithm};
pub use cache::CacheStats;
pub use config::{AlgorithmConfig, CombineMethod, PipelineConfig};
pub use ensemble::{EnsembleMatcher, VotingStrategy};
pub use normalize::normalize_text;
pub use pipeline::SimilarityPipeline;
pub use results::{BatchStatistics, NormalizationResult, SimilarityScore};
