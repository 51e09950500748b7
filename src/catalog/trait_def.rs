//! Storage traits consumed by the pipeline.
//!
//! The pipeline never assumes a particular document store; it only goes
//! through these narrow operations.

use super::CatalogRecord;
use anyhow::Result;
use std::collections::HashSet;

/// Durable catalog of normalized records, keyed by record id.
pub trait CatalogStore: Send + Sync {
    /// Get a single record by id.
    fn get_record(&self, id: &str) -> Result<Option<CatalogRecord>>;

    /// Return the subset of `ids` already present in the catalog.
    ///
    /// Implementations answer with a single bulk lookup; callers are
    /// responsible for keeping `ids` to a reasonable size.
    fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>>;

    /// Insert or replace a single record.
    fn put_record(&self, record: &CatalogRecord) -> Result<()>;

    /// Write all `records` atomically, stamping the insertion time in the store.
    ///
    /// Records whose id already exists are overwritten, never duplicated.
    fn commit_batch(&self, records: &[CatalogRecord]) -> Result<()>;

    /// Page through records ordered by id, starting after `after_id`.
    fn list_records(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<CatalogRecord>>;

    /// Number of records in the catalog.
    fn count_records(&self) -> Result<usize>;
}

/// Raw document access for per-provider progress.
pub trait ProgressBackend: Send + Sync {
    /// Read the document stored at `path`, if any.
    fn get_progress_document(&self, path: &str) -> Result<Option<String>>;

    /// Store `document` at `path`, replacing any previous value.
    fn set_progress_document(&self, path: &str, document: &str) -> Result<()>;
}
