//! Per-provider rotation and offset state, persisted between runs.

use crate::catalog::ProgressBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const PROGRESS_PATH_PREFIX: &str = "ingest_progress";

/// Where a provider left off.
///
/// The zero value (index 0, no offsets) is the normal first-run state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderProgress {
    /// Position in the provider's partition list where the next run starts.
    pub rotation_index: usize,
    /// Partition → next offset to request.
    pub offsets: BTreeMap<String, u32>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl ProviderProgress {
    pub fn offset_for(&self, partition: &str) -> u32 {
        self.offsets.get(partition).copied().unwrap_or(0)
    }
}

/// Loads and saves [`ProviderProgress`] documents.
///
/// Read problems resolve to the default progress and write problems are only
/// logged: losing one run's progress costs redundant fetches, never
/// correctness, because dedup still guards the catalog.
#[derive(Clone)]
pub struct ProgressStore {
    backend: Arc<dyn ProgressBackend>,
}

impl ProgressStore {
    pub fn new(backend: Arc<dyn ProgressBackend>) -> Self {
        Self { backend }
    }

    pub fn document_path(provider_key: &str) -> String {
        format!("{}/{}", PROGRESS_PATH_PREFIX, provider_key)
    }

    pub fn load(&self, provider_key: &str) -> ProviderProgress {
        let path = Self::document_path(provider_key);
        match self.backend.get_progress_document(&path) {
            Ok(Some(document)) => match serde_json::from_str(&document) {
                Ok(progress) => progress,
                Err(e) => {
                    warn!(
                        "Unreadable progress document for {}, starting fresh: {}",
                        provider_key, e
                    );
                    ProviderProgress::default()
                }
            },
            Ok(None) => {
                debug!("No progress stored for {}, starting fresh", provider_key);
                ProviderProgress::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read progress for {}, starting fresh: {}",
                    provider_key, e
                );
                ProviderProgress::default()
            }
        }
    }

    /// Returns whether the document was stored.
    pub fn save(&self, provider_key: &str, progress: &ProviderProgress) -> bool {
        let path = Self::document_path(provider_key);
        let result = serde_json::to_string(progress)
            .map_err(anyhow::Error::from)
            .and_then(|document| self.backend.set_progress_document(&path, &document));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save progress for {}: {}", provider_key, e);
                false
            }
        }
    }
}
