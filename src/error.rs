// src/error.rs - Typed errors for configuration, providers, batch processing and evaluation

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Raised while validating a pipeline configuration. Never produced at scoring time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no similarity algorithms enabled")]
    NoAlgorithmsEnabled,

    #[error("invalid weight {weight} for algorithm {algorithm}: must be within [0, 1]")]
    InvalidWeight { algorithm: String, weight: f64 },

    #[error("invalid threshold {threshold} for algorithm {algorithm}: must be within [0, 1]")]
    InvalidThreshold { algorithm: String, threshold: f64 },

    #[error("invalid minimum similarity {0}: must be within [0, 1]")]
    InvalidMinSimilarity(f64),

    #[error("invalid combine method '{0}': expected weighted, max, min or average")]
    InvalidCombineMethod(String),

    #[error("invalid voting strategy '{0}': expected majority, average, max or min")]
    InvalidVotingStrategy(String),

    #[error("algorithm {0} is configured more than once")]
    DuplicateAlgorithm(String),

    #[error("invalid parameter for algorithm {algorithm}: {message}")]
    InvalidParameter { algorithm: String, message: String },
}

impl ConfigError {
    pub fn invalid_parameter(algorithm: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }
}

/// Failure of a single provider call or of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider {provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("provider {0} returned an empty response")]
    EmptyResponse(String),

    #[error("provider {0} is disabled")]
    Disabled(String),

    #[error("all providers failed: {}", attempts.join("; "))]
    ChainExhausted { attempts: Vec<String> },
}

impl ProviderError {
    pub fn request(provider: &str, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the external collaborators the batch orchestrator drives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// Affects one record only; recorded and the batch continues.
    #[error("{0}")]
    Record(String),

    /// Aborts the batch in the `Failed` state.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl BatchError {
    pub fn record(message: impl Into<String>) -> Self {
        Self::Record(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Raised by weight learning, pair analysis and labeled-pair import/export.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("no labeled pairs to learn from")]
    NoTrainingPairs,

    #[error("invalid {name} {value}: {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{pairs} labeled pairs cannot be split into {folds} folds")]
    NotEnoughPairs { pairs: usize, folds: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported pair file format '{0}': expected json, csv or tsv")]
    UnsupportedFormat(String),

    #[error("labeled pair header has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("failed to open {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EvaluationError {
    pub fn invalid_parameter(name: &'static str, value: f64, expected: &'static str) -> Self {
        Self::InvalidParameter { name, value, expected }
    }

    pub fn file(path: &Path, source: std::io::Error) -> Self {
        Self::File {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_exhausted_lists_attempts() {
        let err = ProviderError::ChainExhausted {
            attempts: vec!["a: timeout".to_string(), "b: HTTP 502".to_string()],
        };
        assert_eq!(err.to_string(), "all providers failed: a: timeout; b: HTTP 502");
    }

    #[test]
    fn test_batch_error_kinds() {
        assert!(BatchError::fatal("storage gone").is_fatal());
        assert!(!BatchError::record("bad payload").is_fatal());
        assert_eq!(BatchError::fatal("x").to_string(), "fatal: x");
    }

    #[test]
    fn test_evaluation_error_messages() {
        let err = EvaluationError::invalid_parameter("learning rate", -0.5, "must be positive");
        assert_eq!(err.to_string(), "invalid learning rate -0.5: must be positive");
        let err = EvaluationError::from(ConfigError::NoAlgorithmsEnabled);
        assert_eq!(err.to_string(), "no similarity algorithms enabled");
        assert!(EvaluationError::NotEnoughPairs { pairs: 2, folds: 5 }
            .to_string()
            .contains("into 5 folds"));
    }
}
