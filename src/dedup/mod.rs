//! Splits candidates into new and already-cataloged records.

use crate::catalog::{CatalogRecord, CatalogStore};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub new_records: Vec<CatalogRecord>,
    /// Records whose id was already in the catalog.
    pub duplicates: Vec<CatalogRecord>,
    /// Candidates dropped because another provider (or page) yielded the same id
    /// earlier in this run.
    pub repeated_in_run: usize,
}

pub struct Deduplicator {
    store: Arc<dyn CatalogStore>,
    chunk_size: usize,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn CatalogStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Ids from `ids` already present in the catalog, one bulk query per chunk.
    pub fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();
        for (index, chunk) in ids.chunks(self.chunk_size).enumerate() {
            let found = self.store.existing_ids(chunk)?;
            debug!(
                "Dedup chunk {}: {} of {} ids already cataloged",
                index + 1,
                found.len(),
                chunk.len()
            );
            existing.extend(found);
        }
        Ok(existing)
    }

    /// Keeps the first candidate per id, then drops every id already cataloged.
    pub fn split(&self, candidates: Vec<CatalogRecord>) -> Result<DedupOutcome> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(candidates.len());
        let mut repeated_in_run = 0;
        for record in candidates {
            if seen.insert(record.id.clone()) {
                unique.push(record);
            } else {
                repeated_in_run += 1;
            }
        }

        let ids: Vec<String> = unique.iter().map(|r| r.id.clone()).collect();
        let existing = self.existing_ids(&ids)?;

        let (duplicates, new_records) = unique
            .into_iter()
            .partition(|record| existing.contains(&record.id));
        Ok(DedupOutcome {
            new_records,
            duplicates,
            repeated_in_run,
        })
    }
}
