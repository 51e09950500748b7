//! Run counters and the human-readable run summary.

use super::RunStage;
use crate::assets::MigrationReport;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Per-provider counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Raw items returned by the provider.
    pub fetched: usize,
    /// Accepted as new after dedup and the record cap.
    pub new: usize,
    /// Already present in the catalog.
    pub duplicate: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: RunStage,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub dry_run: bool,
    pub elapsed: Duration,
    /// Keyed by provider key, in key order.
    pub providers: BTreeMap<String, RunStats>,
    pub provider_errors: Vec<String>,
    pub invalid: usize,
    pub repeated_in_run: usize,
    /// New records left out by the record cap.
    pub over_cap: usize,
    pub assets: MigrationReport,
    pub written: usize,
    /// Accepted records that were not committed.
    pub failed: usize,
    pub stage_failures: Vec<StageFailure>,
    pub progress_saved: Vec<String>,
    pub progress_held_back: Vec<String>,
}

impl RunSummary {
    pub fn stats(&self, provider_key: &str) -> RunStats {
        self.providers.get(provider_key).cloned().unwrap_or_default()
    }

    pub fn total_new(&self) -> usize {
        self.providers.values().map(|s| s.new).sum()
    }

    pub fn total_fetched(&self) -> usize {
        self.providers.values().map(|s| s.fetched).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.stage_failures.is_empty() || self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ingestion run finished in {:.1}s{}",
            self.elapsed.as_secs_f64(),
            if self.dry_run { " (dry run)" } else { "" }
        )?;
        for (key, stats) in &self.providers {
            writeln!(
                f,
                "  {:<12} fetched {:>5}  new {:>5}  duplicate {:>5}  errors {:>3}",
                key, stats.fetched, stats.new, stats.duplicate, stats.errors
            )?;
        }
        writeln!(
            f,
            "  dropped: {} invalid, {} repeated ids, {} over cap",
            self.invalid, self.repeated_in_run, self.over_cap
        )?;
        writeln!(
            f,
            "  assets: {} relocated, {} kept original URL, {} records untouched",
            self.assets.relocated, self.assets.fell_back, self.assets.untouched_records
        )?;
        writeln!(f, "  written: {}, failed: {}", self.written, self.failed)?;
        if self.stage_failures.is_empty() {
            writeln!(f, "  stage failures: none")?;
        } else {
            writeln!(f, "  stage failures:")?;
            for failure in &self.stage_failures {
                writeln!(f, "    - {}: {}", failure.stage, failure.message)?;
            }
        }
        if !self.provider_errors.is_empty() {
            writeln!(f, "  provider errors:")?;
            for error in &self.provider_errors {
                writeln!(f, "    - {}", error)?;
            }
        }
        if !self.progress_held_back.is_empty() {
            writeln!(
                f,
                "  progress not saved for: {}",
                self.progress_held_back.join(", ")
            )?;
        }
        Ok(())
    }
}
