//! Derivation pipeline, record store, analytical join and table sinks.

pub mod builder;
pub mod export;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod store;

pub use builder::AnalyticalRecordBuilder;
pub use pipeline::{DerivationBatch, Pipeline, RunSummary};
pub use sink::ClickHouseSink;
pub use store::{DerivedSnapshot, InMemoryStore};
