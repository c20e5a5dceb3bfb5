// src/models/batch_result.rs - The durable output of one batch run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clustering::DuplicateCluster;
use crate::orchestrator::state::BatchState;
use crate::utils::constants::STOPPED_BY_USER_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    Benchmark,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub source: EnrichmentSource,
    /// Provider that answered, for provider enrichment.
    pub provider: Option<String>,
    pub canonical_name: String,
    pub reference_id: Option<String>,
}

/// Per-record view of a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub index: usize,
    pub source_id: String,
    pub name: String,
    pub normalized_name: String,
    pub quality_score: f64,
    pub quality_issues: Vec<String>,
    pub cluster_id: Option<usize>,
    pub is_master: bool,
    pub enrichment: Option<EnrichmentOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessingResult {
    pub run_id: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub state: BatchState,
    /// Records whose extraction finished; never exceeds the input size.
    pub total_processed: usize,
    pub duplicate_groups: usize,
    /// Records that belong to some duplicate cluster.
    pub total_duplicates: usize,
    pub benchmark_matches: usize,
    pub enriched_count: usize,
    pub created_benchmarks: usize,
    pub errors: Vec<String>,
    pub records: Vec<RecordOutcome>,
    pub clusters: Vec<DuplicateCluster>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchProcessingResult {
    pub fn new(run_id: String, client_id: Option<String>, project_id: Option<String>) -> Self {
        Self {
            run_id,
            client_id,
            project_id,
            state: BatchState::Idle,
            total_processed: 0,
            duplicate_groups: 0,
            total_duplicates: 0,
            benchmark_matches: 0,
            enriched_count: 0,
            created_benchmarks: 0,
            errors: Vec::new(),
            records: Vec::new(),
            clusters: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Appends the stop marker unless it is already present. Returns true if appended.
    pub fn mark_stopped(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.errors.push(STOPPED_BY_USER_MARKER.to_string());
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.errors.iter().any(|e| e == STOPPED_BY_USER_MARKER)
    }

    pub fn stop_marker_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.as_str() == STOPPED_BY_USER_MARKER)
            .count()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub(crate) fn finish(&mut self, state: BatchState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_marker_is_idempotent() {
        let mut result = BatchProcessingResult::new("run".into(), None, None);
        result.add_error("record 3: extraction failed");
        assert!(result.mark_stopped());
        assert!(!result.mark_stopped());
        assert!(!result.mark_stopped());
        assert_eq!(result.stop_marker_count(), 1);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_finish_sets_terminal_state() {
        let mut result = BatchProcessingResult::new("run".into(), Some("c".into()), Some("p".into()));
        assert!(!result.is_finished());
        result.finish(BatchState::Completed);
        assert!(result.is_finished());
        assert_eq!(result.state, BatchState::Completed);
    }
}
