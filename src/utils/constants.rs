// src/utils/constants.rs

/// Entries kept by each pipeline's result cache unless configured otherwise.
pub const DEFAULT_SIMILARITY_CACHE_CAPACITY: usize = 10_000;

/// Records processed between two cancellation checks inside a stage.
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 10;

/// Records processed between two progress events.
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Clusters below this confidence are sent to enrichment alongside singletons.
pub const DEFAULT_ENRICH_CONFIDENCE_BELOW: f64 = 0.9;

/// Capacity of the bounded progress channel.
pub const DEFAULT_PROGRESS_BUFFER_SIZE: usize = 100;

/// Appended to the error list exactly once when a batch is stopped by the user.
pub const STOPPED_BY_USER_MARKER: &str = "stopped by user";

pub const PROVIDER_SYSTEM_PROMPT: &str = "You are an expert in normalizing company and product names. \
Remove typos, expand abbreviations consistently and keep the legal form in its standard short notation.";

/// `{name}` is replaced with the raw record name.
pub const PROVIDER_USER_PROMPT_TEMPLATE: &str =
    "Normalize the company name: \"{name}\". Return only the canonical name without explanations.";
