// src/bin/evaluate_algorithms.rs
//
// Evaluates similarity configurations against a labeled set of pairs.
// The built-in presets are scored at their own duplicate cutoff; every
// algorithm is also run alone with its best threshold searched over
// 0.50..=1.00. Optionally learns weights for one preset, lets the preset's
// algorithms vote as an ensemble, and writes the ranking and a per-pair analysis.
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

use dedupe_lib::evaluation::{
    best_algorithm, evaluate, evaluate_pipelines, export_analysis, export_report, export_results,
    find_optimal_threshold, generate_report, import_training_pairs, EvaluationResult, LearnerConfig,
    SimilarityAnalyzer, SimilarityLearner,
};
use dedupe_lib::similarity::{AlgorithmConfig, EnsembleMatcher, PipelineConfig, SimilarityPipeline, VotingStrategy};
use dedupe_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct EvaluateArgs {
    /// Labeled pairs as .json, .csv or .tsv (text1, text2, is_duplicate)
    pairs: PathBuf,

    /// Presets evaluated at their own min_similarity
    #[arg(long, value_delimiter = ',', default_value = "default,fast,precise")]
    presets: Vec<String>,

    /// Skip the single-algorithm threshold search
    #[arg(long)]
    presets_only: bool,

    /// Learn algorithm weights and a threshold from the pairs (LEARNER_* variables tune it)
    #[arg(long)]
    learn: bool,

    /// Preset whose algorithms are weighted by --learn and voted by --ensemble
    #[arg(long, default_value = "precise")]
    learn_preset: String,

    /// Voting strategies to evaluate over the preset's algorithms (majority, average, max, min)
    #[arg(long, value_delimiter = ',')]
    ensemble: Vec<VotingStrategy>,

    /// Write the ranked results; format follows the extension (.json, .csv, .tsv)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write a per-pair analysis of the best configuration (.json, .csv, .tsv or .md)
    #[arg(long)]
    analysis: Option<PathBuf>,
}

/// One configuration per algorithm of the precise preset, with abstention disabled.
fn single_algorithm_configs() -> Vec<(String, PipelineConfig)> {
    let base = PipelineConfig::precise_config();
    base.algorithms
        .iter()
        .map(|algo| {
            let config = PipelineConfig {
                algorithms: vec![AlgorithmConfig::new(algo.algorithm, 1.0, 0.0)],
                min_similarity: 0.0,
                parallel_execution: false,
                ..base.clone()
            };
            (algo.name().to_string(), config)
        })
        .collect()
}

fn write_analysis_file(config: PipelineConfig, pairs: &[(String, String)], path: &Path) -> Result<()> {
    let analyzer = SimilarityAnalyzer::new(config).context("Invalid configuration for analysis")?;
    let report = analyzer.analyze_pairs(pairs);
    for hint in &report.recommendations {
        info!("💡 {}", hint);
    }
    let written = if path.extension().and_then(|e| e.to_str()) == Some("md") {
        export_report(&report, path)
    } else {
        export_analysis(&report, path)
    };
    written.with_context(|| format!("Failed to write analysis to {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = EvaluateArgs::parse();
    let start_time = Instant::now();

    let pairs = import_training_pairs(&args.pairs)
        .with_context(|| format!("Failed to load labeled pairs from {}", args.pairs.display()))?;
    let duplicates = pairs.iter().filter(|p| p.is_duplicate).count();
    info!(
        "📥 Loaded {} labeled pairs ({} duplicates, {} distinct)",
        pairs.len(),
        duplicates,
        pairs.len() - duplicates
    );

    let mut configs = Vec::new();
    for name in &args.presets {
        let config = PipelineConfig::preset(name).with_context(|| format!("Unknown preset '{}'", name))?;
        configs.push((format!("preset:{}", name.trim()), config));
    }

    let learn_base = PipelineConfig::preset(&args.learn_preset)
        .with_context(|| format!("Unknown preset '{}'", args.learn_preset))?;
    if args.learn {
        let learner_config = LearnerConfig::from_env();
        learner_config.log_config();
        let mut learner = SimilarityLearner::new(learn_base.clone(), learner_config)?;
        learner.add_pairs(&pairs);
        let learned = learner.optimize_weights()?;
        let cv = learner.cross_validate()?;
        info!(
            "🔁 Cross-validated learned weights: P={:.3} R={:.3} F1={:.3} over {} folds",
            cv.average.precision,
            cv.average.recall,
            cv.average.f1,
            cv.folds.len()
        );
        configs.push((format!("learned:{}", args.learn_preset.trim()), learned.apply_to(learner.base())));
    }

    let mut results: Vec<EvaluationResult> =
        evaluate_pipelines(&pairs, &configs).context("Invalid preset configuration")?;

    for strategy in &args.ensemble {
        let ensemble = EnsembleMatcher::new(learn_base.clone(), *strategy)
            .with_context(|| format!("Invalid configuration for ensemble {}", strategy))?;
        let name = format!("ensemble:{}:{}", args.learn_preset.trim(), strategy);
        results.push(evaluate(
            &name,
            &pairs,
            |a, b| ensemble.similarity(a, b),
            learn_base.min_similarity,
        ));
    }

    if !args.presets_only {
        for (name, config) in single_algorithm_configs() {
            let pipeline = SimilarityPipeline::new(config)
                .with_context(|| format!("Invalid configuration for algorithm {}", name))?;
            results.push(find_optimal_threshold(&name, &pairs, |a, b| pipeline.similarity(a, b)));
        }
    }

    println!("{}", generate_report(&results));
    let best = best_algorithm(&results);
    match best {
        Some(best) => info!(
            "🏆 Best configuration: {} at threshold {:.2} (F1={:.3})",
            best.name, best.threshold, best.metrics.f1
        ),
        None => info!("No configurations evaluated"),
    }

    if let Some(path) = &args.analysis {
        // Analysis runs a pipeline, so the best pipeline-backed configuration is used.
        let config = best
            .and_then(|b| configs.iter().find(|(name, _)| *name == b.name))
            .or_else(|| configs.first())
            .map(|(_, config)| config.clone())
            .unwrap_or(learn_base);
        let texts: Vec<(String, String)> = pairs.iter().map(|p| (p.text1.clone(), p.text2.clone())).collect();
        write_analysis_file(config, &texts, path)?;
    }

    if let Some(path) = &args.save {
        export_results(&results, path).with_context(|| format!("Failed to write results to {}", path.display()))?;
    }

    info!("✅ Evaluation finished in {:.2?}", start_time.elapsed());
    Ok(())
}
