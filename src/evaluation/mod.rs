// src/evaluation/mod.rs - Quality evaluation, weight learning and analysis of similarity configurations

pub mod analyzer;
pub mod evaluator;
pub mod export;
pub mod learner;
pub mod metrics;

pub use analyzer::{AnalysisReport, AnalysisStatistics, PairAnalysis, SimilarityAnalyzer};
pub use evaluator::{
    best_algorithm, compare_results, evaluate, evaluate_pipelines, evaluate_with_adaptive_threshold,
    find_optimal_threshold, generate_report, EvaluationResult, LabeledPair,
};
pub use export::{
    export_analysis, export_report, export_results, export_training_pairs, import_training_pairs,
    read_training_pairs, write_analysis, write_report, write_results, write_training_pairs, ExportFormat,
};
pub use learner::{
    average_metrics, CrossValidation, FoldResult, LearnedWeights, LearnerConfig, SimilarityLearner,
};
pub use metrics::{ConfusionMatrix, Metrics};
