// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod dates;
pub mod engine;
pub mod file_refs;
pub mod ingest;
pub mod metrics;
pub mod relevance;
pub mod source_weights;
pub mod terms;

// ---- Re-exports for stable public API ----
pub use crate::config::{PipelineConfig, ProviderSettings};
pub use crate::dates::{DateResolver, PageFetcher};
pub use crate::ingest::types::{PublishedHint, RawItem, SourceKind, SourceProvider, TrendItem};
pub use crate::ingest::TrendPipeline;
