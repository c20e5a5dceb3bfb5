// src/orchestrator/mod.rs - Batch orchestration: lifecycle, cancellation, enrichment and scoring

pub mod batch;
pub mod providers;
pub mod quality;
pub mod signal;
pub mod state;

pub use batch::{BatchConfig, BatchOrchestrator, BatchOutcome};
pub use providers::{
    ChainCompletion, HttpCompletionProvider, HttpProviderConfig, NormalizationProvider, ProviderApi,
    ProviderChain,
};
pub use quality::{score_record, QualityAssessment, QualityWeights};
pub use signal::StopSignal;
pub use state::BatchState;
