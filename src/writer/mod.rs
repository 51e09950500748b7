//! Chunked durable commit of accepted records.

use crate::catalog::{CatalogRecord, CatalogStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub committed: usize,
    pub chunks: usize,
}

/// A chunk failed; earlier chunks stay committed.
#[derive(Debug, Error)]
#[error("chunk {chunk_index} failed after {committed} records were committed ({unwritten} left unwritten): {source:#}")]
pub struct BatchWriteError {
    /// 1-based index of the failing chunk.
    pub chunk_index: usize,
    pub committed: usize,
    pub unwritten: usize,
    /// Ids of every record not committed (the failing chunk and all later ones).
    pub unwritten_ids: Vec<String>,
    pub source: anyhow::Error,
}

pub struct BatchWriter {
    store: Arc<dyn CatalogStore>,
    chunk_size: usize,
    dry_run: bool,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn CatalogStore>, chunk_size: usize, dry_run: bool) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            dry_run,
        }
    }

    /// Commit `records` in sequential chunks, stopping at the first failure.
    pub fn commit(&self, records: &[CatalogRecord]) -> Result<CommitReport, BatchWriteError> {
        let total_chunks = records.len().div_ceil(self.chunk_size);

        if self.dry_run {
            info!(
                "[dry-run] would commit {} records in {} chunk(s) of up to {}",
                records.len(),
                total_chunks,
                self.chunk_size
            );
            return Ok(CommitReport::default());
        }

        let mut report = CommitReport::default();
        for (index, chunk) in records.chunks(self.chunk_size).enumerate() {
            if let Err(source) = self.store.commit_batch(chunk) {
                let unwritten_ids: Vec<String> = records[report.committed..]
                    .iter()
                    .map(|r| r.id.clone())
                    .collect();
                let failure = BatchWriteError {
                    chunk_index: index + 1,
                    committed: report.committed,
                    unwritten: unwritten_ids.len(),
                    unwritten_ids,
                    source,
                };
                error!("Batch write stopped: {}", failure);
                return Err(failure);
            }
            report.committed += chunk.len();
            report.chunks += 1;
            info!(
                "Committed chunk {}/{} ({} records)",
                index + 1,
                total_chunks,
                chunk.len()
            );
        }
        Ok(report)
    }
}
