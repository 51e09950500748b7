//! In-process catalog store.
//!
//! Keeps everything in ordered maps behind a mutex. Useful for tests and for
//! exercising the pipeline without a database file.

use super::{CatalogRecord, CatalogStore, ProgressBackend};
use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryCatalogStore {
    records: Mutex<BTreeMap<String, CatalogRecord>>,
    progress: Mutex<BTreeMap<String, String>>,
    existence_queries: AtomicUsize,
    committed_batches: AtomicUsize,
    /// Batches accepted before `commit_batch` starts failing, unlimited when unset.
    batch_limit: Mutex<Option<usize>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `commit_batch` after the first `batches` fail.
    pub fn fail_commits_after(&self, batches: usize) {
        if let Ok(mut limit) = self.batch_limit.lock() {
            *limit = Some(batches);
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.records.lock() {
            for record in records {
                map.insert(record.id.clone(), record);
            }
        }
        store
    }

    /// Number of `existing_ids` calls served so far.
    pub fn existence_queries(&self) -> usize {
        self.existence_queries.load(Ordering::SeqCst)
    }

    /// Number of successful `commit_batch` calls so far.
    pub fn committed_batches(&self) -> usize {
        self.committed_batches.load(Ordering::SeqCst)
    }

    pub fn all_records(&self) -> Vec<CatalogRecord> {
        self.records
            .lock()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CatalogRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory catalog mutex poisoned"))
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn get_record(&self, id: &str) -> Result<Option<CatalogRecord>> {
        Ok(self.records()?.get(id).cloned())
    }

    fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        self.existence_queries.fetch_add(1, Ordering::SeqCst);
        let records = self.records()?;
        Ok(ids
            .iter()
            .filter(|id| records.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    fn put_record(&self, record: &CatalogRecord) -> Result<()> {
        self.records()?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn commit_batch(&self, records: &[CatalogRecord]) -> Result<()> {
        let limit = *self
            .batch_limit
            .lock()
            .map_err(|_| anyhow::anyhow!("memory catalog mutex poisoned"))?;
        if let Some(limit) = limit {
            if self.committed_batches() >= limit {
                anyhow::bail!("memory catalog rejected batch: commit limit reached");
            }
        }
        let mut map = self.records()?;
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        self.committed_batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_records(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<CatalogRecord>> {
        let records = self.records()?;
        Ok(records
            .iter()
            .filter(|(id, _)| after_id.map_or(true, |after| id.as_str() > after))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn count_records(&self) -> Result<usize> {
        Ok(self.records()?.len())
    }
}

impl ProgressBackend for MemoryCatalogStore {
    fn get_progress_document(&self, path: &str) -> Result<Option<String>> {
        let progress = self
            .progress
            .lock()
            .map_err(|_| anyhow::anyhow!("memory progress mutex poisoned"))?;
        Ok(progress.get(path).cloned())
    }

    fn set_progress_document(&self, path: &str, document: &str) -> Result<()> {
        let mut progress = self
            .progress
            .lock()
            .map_err(|_| anyhow::anyhow!("memory progress mutex poisoned"))?;
        progress.insert(path.to_string(), document.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_commit_limit_rejects_later_batches() {
        let store = MemoryCatalogStore::new();
        store.fail_commits_after(1);

        store.commit_batch(&[record("a-1")]).unwrap();
        assert!(store.commit_batch(&[record("a-2")]).is_err());

        assert_eq!(store.committed_batches(), 1);
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn test_list_records_pages_by_id() {
        let store = MemoryCatalogStore::with_records(vec![record("a-1"), record("a-2"), record("a-3")]);
        let first = store.list_records(None, 2).unwrap();
        assert_eq!(first.len(), 2);
        let rest = store.list_records(Some(&first[1].id), 2).unwrap();
        assert_eq!(rest, vec![record("a-3")]);
    }
}
