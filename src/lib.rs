// src/lib.rs
pub mod clustering;
pub mod error;
pub mod evaluation;
pub mod external;
pub mod models;
pub mod orchestrator;
pub mod similarity;
pub mod utils;

pub use error::{BatchError, ConfigError, EvaluationError, ProviderError};
pub use models::{BatchProcessingResult, SourceRecord};
pub use orchestrator::{BatchConfig, BatchOrchestrator, BatchState, StopSignal};
pub use similarity::{PipelineConfig, SimilarityPipeline};
