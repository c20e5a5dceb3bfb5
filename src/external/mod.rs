// src/external/mod.rs - Interfaces to collaborators outside the dedup core

pub mod benchmark;
pub mod extractor;
pub mod validators;

pub use benchmark::{BenchmarkLookup, InMemoryBenchmarkCatalog};
pub use extractor::{AttributeExtractor, JsonAttributeExtractor};
pub use validators::{ChecksumValidators, TaxIdValidator};
