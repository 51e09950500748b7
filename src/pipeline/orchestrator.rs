//! One ingestion run, from fetching every provider to the run summary.
//!
//! Stages run strictly forward:
//! `Init → FetchAll → Validate → Dedup → MigrateAssets → Write → Summarize → Done`.
//! A failing stage is recorded in the summary and the run carries on with
//! whatever partial result it has. Only a configuration problem found during
//! `Init` aborts the run.

use super::stats::{RunStats, RunSummary, StageFailure};
use super::validation::retain_valid;
use crate::assets::{AssetFetcher, AssetMigrator, ObjectStore, RetryPolicy};
use crate::catalog::{CatalogRecord, CatalogStore};
use crate::config::{AppConfig, ConfigError};
use crate::dedup::Deduplicator;
use crate::progress::ProgressStore;
use crate::providers::ProviderAdapter;
use crate::writer::BatchWriter;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Init,
    FetchAll,
    Validate,
    Dedup,
    MigrateAssets,
    Write,
    Summarize,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Init => "init",
            RunStage::FetchAll => "fetch",
            RunStage::Validate => "validate",
            RunStage::Dedup => "dedup",
            RunStage::MigrateAssets => "migrate-assets",
            RunStage::Write => "write",
            RunStage::Summarize => "summarize",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Current stage of a run; only moves forward.
struct StageTracker {
    current: RunStage,
}

impl StageTracker {
    fn enter(&mut self, next: RunStage) {
        debug_assert!(next > self.current, "{} cannot follow {}", next, self.current);
        debug!("Run stage {} → {}", self.current, next);
        self.current = next;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Cap on new records per run, applied after dedup.
    pub max_records: Option<usize>,
}

pub struct Orchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    progress: ProgressStore,
    deduplicator: Deduplicator,
    migrator: AssetMigrator,
    writer: BatchWriter,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        progress: ProgressStore,
        deduplicator: Deduplicator,
        migrator: AssetMigrator,
        writer: BatchWriter,
        options: RunOptions,
    ) -> Self {
        Self {
            adapters,
            progress,
            deduplicator,
            migrator,
            writer,
            options,
        }
    }

    /// Wire every stage from resolved configuration and already-built clients.
    pub fn from_config(
        config: &AppConfig,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        catalog: Arc<dyn CatalogStore>,
        progress: ProgressStore,
        fetcher: Arc<dyn AssetFetcher>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let options = RunOptions {
            dry_run: config.dry_run,
            max_records: config.max_records,
        };
        Self::new(
            adapters,
            progress,
            Deduplicator::new(catalog.clone(), config.dedup_chunk_size),
            AssetMigrator::new(
                fetcher,
                objects,
                RetryPolicy::new(&config.assets),
                config.assets.concurrency,
                options.dry_run,
            ),
            BatchWriter::new(catalog, config.writer_chunk_size, options.dry_run),
            options,
        )
    }

    /// Execute one run.
    ///
    /// The only error is a configuration error detected before any fetch.
    pub async fn run(&self) -> Result<RunSummary, ConfigError> {
        let started = Instant::now();
        let mut stage = StageTracker {
            current: RunStage::Init,
        };
        let mut summary = RunSummary {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        let usable = self.adapters.iter().filter(|a| a.is_usable()).count();
        if usable == 0 && !self.options.dry_run {
            error!("No usable provider configured, aborting run");
            return Err(ConfigError::NoUsableProviders);
        }
        info!(
            "Starting ingestion run: {} provider(s), {} usable{}",
            self.adapters.len(),
            usable,
            if self.options.dry_run { ", dry run" } else { "" }
        );

        stage.enter(RunStage::FetchAll);
        let fetches = self.adapters.iter().map(|adapter| {
            let prior = self.progress.load(adapter.key());
            let adapter = adapter.clone();
            async move { adapter.fetch(prior).await }
        });
        let outputs = join_all(fetches).await;

        // Record id → provider key, to attribute later stages per provider
        let mut origin: HashMap<String, &'static str> = HashMap::new();
        let mut candidates: Vec<CatalogRecord> = Vec::new();
        for output in &outputs {
            let stats = summary
                .providers
                .entry(output.provider_key.to_string())
                .or_default();
            stats.fetched = output.fetched;
            stats.errors = output.errors.len();
            summary.provider_errors.extend(output.errors.iter().cloned());
            info!(
                "{}: {} fetched, {} candidate(s), {} error(s)",
                output.provider_key,
                output.fetched,
                output.records.len(),
                output.errors.len()
            );
            for record in &output.records {
                origin.entry(record.id.clone()).or_insert(output.provider_key);
            }
            candidates.extend(output.records.iter().cloned());
        }

        stage.enter(RunStage::Validate);
        let (candidates, invalid) = retain_valid(candidates);
        summary.invalid = invalid;

        // Providers whose accepted records did not all reach the catalog
        let mut incomplete: HashSet<&'static str> = HashSet::new();
        let attribute = |id: &str| origin.get(id).copied();

        stage.enter(RunStage::Dedup);
        let mut new_records = match self.deduplicator.split(candidates.clone()) {
            Ok(outcome) => {
                summary.repeated_in_run = outcome.repeated_in_run;
                for record in &outcome.duplicates {
                    if let Some(key) = attribute(&record.id) {
                        stats_for(&mut summary, key).duplicate += 1;
                    }
                }
                outcome.new_records
            }
            Err(e) => {
                error!("Dedup failed, nothing will be written this run: {:#}", e);
                summary.stage_failures.push(StageFailure {
                    stage: RunStage::Dedup,
                    message: format!("{:#}", e),
                });
                incomplete.extend(candidates.iter().filter_map(|r| attribute(&r.id)));
                Vec::new()
            }
        };

        if let Some(max) = self.options.max_records {
            if new_records.len() > max {
                let over_cap = new_records.split_off(max);
                info!(
                    "Record cap {} reached, leaving {} new record(s) for a later run",
                    max,
                    over_cap.len()
                );
                summary.over_cap = over_cap.len();
                incomplete.extend(over_cap.iter().filter_map(|r| attribute(&r.id)));
            }
        }

        // Records left for a later run by the cap are not counted as new
        for record in &new_records {
            if let Some(key) = attribute(&record.id) {
                stats_for(&mut summary, key).new += 1;
            }
        }

        stage.enter(RunStage::MigrateAssets);
        let (new_records, asset_report) = self.migrator.migrate(new_records).await;
        summary.assets = asset_report;

        stage.enter(RunStage::Write);
        match self.writer.commit(&new_records) {
            Ok(report) => summary.written = report.committed,
            Err(e) => {
                summary.written = e.committed;
                summary.failed = e.unwritten;
                incomplete.extend(e.unwritten_ids.iter().filter_map(|id| attribute(id)));
                summary.stage_failures.push(StageFailure {
                    stage: RunStage::Write,
                    message: e.to_string(),
                });
            }
        }

        stage.enter(RunStage::Summarize);
        for output in &outputs {
            let key = output.provider_key;
            if self.options.dry_run {
                debug!("[dry-run] not saving progress for {}", key);
            } else if incomplete.contains(key) {
                warn!(
                    "Not saving progress for {}: some of its records were not committed",
                    key
                );
                summary.progress_held_back.push(key.to_string());
            } else if self.progress.save(key, &output.progress) {
                summary.progress_saved.push(key.to_string());
            } else {
                summary.progress_held_back.push(key.to_string());
            }
        }
        summary.elapsed = started.elapsed();

        stage.enter(RunStage::Done);
        info!(
            "Run done: {} new, {} written, {} failed, {} stage failure(s) in {:.1}s",
            summary.total_new(),
            summary.written,
            summary.failed,
            summary.stage_failures.len(),
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }
}

fn stats_for<'a>(summary: &'a mut RunSummary, key: &str) -> &'a mut RunStats {
    summary.providers.entry(key.to_string()).or_default()
}
