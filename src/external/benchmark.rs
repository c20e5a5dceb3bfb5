// src/external/benchmark.rs - Reference catalog lookup used during enrichment

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::error::BatchError;
use crate::models::{ExtractedAttributes, ReferenceRecord};
use crate::similarity::normalize_text;

/// A trusted catalog of canonical records. Not finding a match is `Ok(None)`.
#[async_trait]
pub trait BenchmarkLookup: Send + Sync {
    async fn find(
        &self,
        name: &str,
        attributes: &ExtractedAttributes,
    ) -> Result<Option<ReferenceRecord>, BatchError>;

    /// Offers a new reference record. Returns true when the catalog accepted it.
    async fn register(&self, _record: ReferenceRecord) -> Result<bool, BatchError> {
        Ok(false)
    }
}

/// Catalog held in memory; matches by tax identifier first, then by normalized name.
#[derive(Default)]
pub struct InMemoryBenchmarkCatalog {
    records: RwLock<Vec<ReferenceRecord>>,
}

impl InMemoryBenchmarkCatalog {
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference catalog {}", path.display()))?;
        let records: Vec<ReferenceRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse reference catalog {}", path.display()))?;
        info!("📚 Loaded {} reference records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ReferenceRecord> {
        self.records.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lookup(records: &[ReferenceRecord], name: &str, tax_id: Option<&str>) -> Option<ReferenceRecord> {
        if let Some(tax_id) = tax_id.map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(hit) = records
                .iter()
                .find(|r| r.tax_id.as_deref().map(str::trim) == Some(tax_id))
            {
                return Some(hit.clone());
            }
        }
        let normalized = normalize_text(name);
        if normalized.is_empty() {
            return None;
        }
        records
            .iter()
            .find(|r| normalize_text(&r.canonical_name) == normalized)
            .cloned()
    }
}

#[async_trait]
impl BenchmarkLookup for InMemoryBenchmarkCatalog {
    async fn find(
        &self,
        name: &str,
        attributes: &ExtractedAttributes,
    ) -> Result<Option<ReferenceRecord>, BatchError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::lookup(&records, name, attributes.tax_id.as_deref()))
    }

    async fn register(&self, record: ReferenceRecord) -> Result<bool, BatchError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if Self::lookup(&records, &record.canonical_name, record.tax_id.as_deref()).is_some() {
            debug!("Reference '{}' already present, not registered", record.canonical_name);
            return Ok(false);
        }
        debug!("Registered reference '{}'", record.canonical_name);
        records.push(record);
        Ok(true)
    }
}
