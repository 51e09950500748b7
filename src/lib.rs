//! Catalog ingestion pipeline library
//!
//! Exposes the pipeline stages for the `catalog-ingest` binary and for
//! integration tests.

pub mod assets;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod ref_migration;
pub mod sqlite_persistence;
pub mod writer;

// Re-export commonly used types for convenience
pub use catalog::{CatalogRecord, CatalogStore, MemoryCatalogStore, ProgressBackend, SqliteCatalogStore};
pub use config::{AppConfig, CliConfig, ConfigError, FileConfig};
pub use pipeline::{Orchestrator, RunOptions, RunSummary};
pub use progress::{ProgressStore, ProviderProgress};
