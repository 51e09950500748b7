//! Rewrites internal `store://` asset references into public token URLs.
//!
//! Records are scanned page by page in id order. Each internal reference gets
//! the object's existing access token (or a freshly minted one) and becomes
//! `<public base>/<path>?token=<token>`. Conversions run in bounded windows
//! with the same linear retry as asset relocation.

use crate::assets::refs::{self, AssetKind};
use crate::assets::{AssetError, ObjectStore, RetryPolicy};
use crate::catalog::{CatalogRecord, CatalogStore};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_REPORTED_FAILURES: usize = 20;
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefMigrationOptions {
    pub dry_run: bool,
    /// Stop after converting this many records.
    pub max_records: Option<usize>,
    pub page_size: usize,
}

impl Default for RefMigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_records: None,
            page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefMigrationReport {
    pub scanned: usize,
    /// Records rewritten (or, in dry-run, that would be).
    pub converted: usize,
    /// Records with nothing left to convert and at least one public URL of
    /// the owned store.
    pub already_converted: usize,
    pub failed: usize,
    /// First few ids that failed.
    pub failed_ids: Vec<String>,
}

impl std::fmt::Display for RefMigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scanned {}, converted {}, already converted {}, failed {}",
            self.scanned, self.converted, self.already_converted, self.failed
        )?;
        if !self.failed_ids.is_empty() {
            write!(f, " (first failures: {})", self.failed_ids.join(", "))?;
        }
        Ok(())
    }
}

pub struct RefMigrator {
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    retry_policy: RetryPolicy,
    concurrency: usize,
    options: RefMigrationOptions,
}

impl RefMigrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        retry_policy: RetryPolicy,
        concurrency: usize,
        options: RefMigrationOptions,
    ) -> Self {
        Self {
            catalog,
            objects,
            retry_policy,
            concurrency: concurrency.max(1),
            options,
        }
    }

    pub async fn run(&self) -> Result<RefMigrationReport> {
        let mut report = RefMigrationReport::default();
        let mut after_id: Option<String> = None;
        let mut remaining_budget = self.options.max_records.unwrap_or(usize::MAX);

        while remaining_budget > 0 {
            let page = self
                .catalog
                .list_records(after_id.as_deref(), self.options.page_size.max(1))
                .context("Failed to list catalog records")?;
            let Some(last) = page.last() else {
                break;
            };
            after_id = Some(last.id.clone());
            report.scanned += page.len();

            let mut pending = Vec::new();
            for record in page {
                if !has_internal_reference(&record) {
                    if AssetKind::ALL
                        .iter()
                        .any(|kind| self.objects.owns_url(kind.reference(&record)))
                    {
                        report.already_converted += 1;
                    }
                } else if pending.len() < remaining_budget {
                    pending.push(record);
                }
            }
            remaining_budget -= pending.len();

            if self.options.dry_run {
                for record in &pending {
                    info!("[dry-run] would convert references of {}", record.id);
                }
                report.converted += pending.len();
                continue;
            }

            let mut records = pending.into_iter();
            loop {
                let window: Vec<CatalogRecord> = records.by_ref().take(self.concurrency).collect();
                if window.is_empty() {
                    break;
                }
                let results = join_all(window.into_iter().map(|record| self.convert_record(record))).await;
                for result in results {
                    match result.and_then(|record| self.save(record)) {
                        Ok(id) => {
                            debug!("Converted references of {}", id);
                            report.converted += 1;
                        }
                        Err((id, reason)) => {
                            warn!("Failed to convert references of {}: {}", id, reason);
                            report.failed += 1;
                            if report.failed_ids.len() < MAX_REPORTED_FAILURES {
                                report.failed_ids.push(id);
                            }
                        }
                    }
                }
            }
        }

        info!("Reference migration: {}", report);
        Ok(report)
    }

    fn save(&self, record: CatalogRecord) -> Result<String, (String, String)> {
        self.catalog
            .put_record(&record)
            .map(|_| record.id.clone())
            .map_err(|e| (record.id.clone(), format!("{:#}", e)))
    }

    async fn convert_record(&self, mut record: CatalogRecord) -> Result<CatalogRecord, (String, String)> {
        for kind in AssetKind::ALL {
            let Some(path) = refs::parse_store_reference(kind.reference(&record)).map(str::to_string)
            else {
                continue;
            };
            let token = self
                .token_with_retry(&path)
                .await
                .map_err(|e| (record.id.clone(), e.to_string()))?;
            kind.set_reference(&mut record, self.objects.public_url(&path, &token));
        }
        Ok(record)
    }

    async fn token_with_retry(&self, path: &str) -> Result<String, AssetError> {
        let mut attempt = 1;
        loop {
            match self.resolve_token(path).await {
                Ok(token) => return Ok(token),
                Err(e) if self.retry_policy.should_retry(&e, attempt) => {
                    let delay = self.retry_policy.delay_after(attempt);
                    debug!("Token lookup for {} failed, retrying in {:?}: {}", path, delay, e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn resolve_token(&self, path: &str) -> Result<String, AssetError> {
        match self.objects.access_token(path).await? {
            Some(token) => Ok(token),
            None => self.objects.mint_access_token(path).await,
        }
    }
}

fn has_internal_reference(record: &CatalogRecord) -> bool {
    AssetKind::ALL
        .iter()
        .any(|kind| refs::parse_store_reference(kind.reference(record)).is_some())
}
