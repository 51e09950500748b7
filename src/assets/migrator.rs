//! Asset migration stage: downloads external media and re-uploads it into the
//! owned object store, in bounded windows.

use super::refs::{self, AssetKind};
use super::{detect_content_type, AssetError, AssetFetcher, ObjectStore, RetryPolicy};
use crate::catalog::CatalogRecord;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of one asset through relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// Attempt number `n` (1-based) is about to run.
    Attempting(u32),
    Succeeded(String),
    FallenBack(String),
}

/// Final result for one asset. Never fails the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetMigrationOutcome {
    /// New `store://` reference.
    Relocated(String),
    /// Original external URL, kept after the retries ran out.
    FellBack(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub relocated: usize,
    pub fell_back: usize,
    /// Records with no external reference to migrate.
    pub untouched_records: usize,
}

impl MigrationReport {
    fn absorb(&mut self, outcomes: &[AssetMigrationOutcome]) {
        if outcomes.is_empty() {
            self.untouched_records += 1;
        }
        for outcome in outcomes {
            match outcome {
                AssetMigrationOutcome::Relocated(_) => self.relocated += 1,
                AssetMigrationOutcome::FellBack(_) => self.fell_back += 1,
            }
        }
    }
}

pub struct AssetMigrator {
    fetcher: Arc<dyn AssetFetcher>,
    store: Arc<dyn ObjectStore>,
    retry_policy: RetryPolicy,
    concurrency: usize,
    dry_run: bool,
}

impl AssetMigrator {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        store: Arc<dyn ObjectStore>,
        retry_policy: RetryPolicy,
        concurrency: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            fetcher,
            store,
            retry_policy,
            concurrency: concurrency.max(1),
            dry_run,
        }
    }

    /// References of `record` that should be relocated.
    pub fn pending_assets(&self, record: &CatalogRecord) -> Vec<AssetKind> {
        AssetKind::ALL
            .into_iter()
            .filter(|kind| {
                let reference = kind.reference(record);
                refs::is_external_url(reference) && !self.store.owns_url(reference)
            })
            .collect()
    }

    /// Relocate the assets of `records`, preserving order.
    ///
    /// Windows of `concurrency` records run concurrently; the next window
    /// starts once every record of the current one has settled.
    pub async fn migrate(&self, records: Vec<CatalogRecord>) -> (Vec<CatalogRecord>, MigrationReport) {
        let mut report = MigrationReport::default();

        if self.dry_run {
            for record in &records {
                let pending = self.pending_assets(record);
                if pending.is_empty() {
                    report.untouched_records += 1;
                }
                for kind in pending {
                    info!(
                        "[dry-run] would relocate {} {} from {}",
                        record.id,
                        kind.file_stem(),
                        kind.reference(record)
                    );
                }
            }
            return (records, report);
        }

        let total = records.len();
        let mut migrated = Vec::with_capacity(total);
        let mut remaining = records.into_iter();
        let mut window_index = 0usize;
        loop {
            let window: Vec<CatalogRecord> = remaining.by_ref().take(self.concurrency).collect();
            if window.is_empty() {
                break;
            }
            window_index += 1;
            debug!("Asset window {} ({} records)", window_index, window.len());

            let settled = join_all(window.into_iter().map(|record| self.migrate_record(record))).await;
            for (record, outcomes) in settled {
                report.absorb(&outcomes);
                migrated.push(record);
            }
        }

        info!(
            "Asset migration: {} records, {} relocated, {} kept original URL, {} untouched",
            total, report.relocated, report.fell_back, report.untouched_records
        );
        (migrated, report)
    }

    async fn migrate_record(&self, mut record: CatalogRecord) -> (CatalogRecord, Vec<AssetMigrationOutcome>) {
        let mut outcomes = Vec::new();
        for kind in self.pending_assets(&record) {
            let outcome = self.migrate_asset(&record, kind).await;
            if let AssetMigrationOutcome::Relocated(reference) = &outcome {
                kind.set_reference(&mut record, reference.clone());
            }
            outcomes.push(outcome);
        }
        (record, outcomes)
    }

    async fn migrate_asset(&self, record: &CatalogRecord, kind: AssetKind) -> AssetMigrationOutcome {
        let url = kind.reference(record).to_string();
        let mut state = MigrationState::Attempting(1);
        loop {
            state = match state {
                MigrationState::Attempting(attempt) => match self.relocate_once(record, kind, &url).await {
                    Ok(reference) => MigrationState::Succeeded(reference),
                    Err(e) if self.retry_policy.should_retry(&e, attempt) => {
                        let delay = self.retry_policy.delay_after(attempt);
                        warn!(
                            "Attempt {}/{} to relocate {} {} failed, retrying in {:?}: {}",
                            attempt,
                            self.retry_policy.max_attempts(),
                            record.id,
                            kind.file_stem(),
                            delay,
                            e
                        );
                        tokio::time::sleep(delay).await;
                        MigrationState::Attempting(attempt + 1)
                    }
                    Err(e) => {
                        warn!(
                            "Giving up relocating {} {} after {} attempt(s), keeping {}: {}",
                            record.id,
                            kind.file_stem(),
                            attempt,
                            url,
                            e
                        );
                        MigrationState::FallenBack(url.clone())
                    }
                },
                MigrationState::Succeeded(reference) => {
                    return AssetMigrationOutcome::Relocated(reference)
                }
                MigrationState::FallenBack(original) => {
                    return AssetMigrationOutcome::FellBack(original)
                }
            };
        }
    }

    async fn relocate_once(
        &self,
        record: &CatalogRecord,
        kind: AssetKind,
        url: &str,
    ) -> Result<String, AssetError> {
        let fetched = self.fetcher.fetch(url).await?;
        if fetched.bytes.is_empty() {
            return Err(AssetError::EmptyBody(url.to_string()));
        }
        let content_type = detect_content_type(&fetched, kind);
        let path = refs::object_path(record, kind, refs::extension_for(&content_type, kind));
        self.store
            .put_object(&path, &fetched.bytes, &content_type)
            .await?;
        debug!("Relocated {} → {}", url, path);
        Ok(refs::store_reference(&path))
    }
}
