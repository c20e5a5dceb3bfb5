pub mod batch_result;
pub mod record;

pub use batch_result::{BatchProcessingResult, EnrichmentOutcome, EnrichmentSource, RecordOutcome};
pub use record::{ExtractedAttributes, ReferenceRecord, SourceRecord};
