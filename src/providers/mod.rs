//! Provider adapters.
//!
//! Every provider exposes a paged catalog-search endpoint that is queried
//! through a fixed list of partitions (genre tags or search strings). A
//! [`PageSource`] knows how to fetch one page and how to normalize one raw
//! item; [`PartitionedAdapter`] wraps it with the shared rotation, offset and
//! rate-limit handling.

mod audius;
mod ccmixter;
mod http;
mod jamendo;
pub mod lenient;
mod musicbrainz;
mod openverse;
mod registry;
pub mod rotation;
#[cfg(test)]
mod stub_server;

pub use audius::AudiusSource;
pub use ccmixter::CcMixterSource;
pub use http::ProviderHttp;
pub use jamendo::JamendoSource;
pub use musicbrainz::MusicBrainzSource;
pub use openverse::OpenverseSource;
pub use registry::{build_adapters, ALL_PROVIDER_KEYS};

use crate::catalog::CatalogRecord;
use crate::config::ProviderSettings;
use crate::progress::ProviderProgress;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of a single page request.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed page: {0}")]
    Decode(String),
}

/// Which media a provider's items must carry to be worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRequirement {
    /// Items with neither audio nor artwork are dropped.
    AudioOrArtwork,
    /// Metadata-only provider, nothing required.
    None,
}

impl MediaRequirement {
    pub fn is_satisfied_by(&self, record: &CatalogRecord) -> bool {
        match self {
            MediaRequirement::AudioOrArtwork => record.has_audio() || record.has_artwork(),
            MediaRequirement::None => true,
        }
    }
}

/// Static description of a provider plus per-deployment overrides.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Stable key used for progress documents and configuration.
    pub key: &'static str,
    /// Display name, also stored in record provenance.
    pub name: &'static str,
    /// Prefix of every record id produced by this provider.
    pub id_prefix: &'static str,
    pub partitions: Vec<String>,
    pub partitions_per_run: usize,
    pub page_size: u32,
    /// Pause between two partition requests in the same run.
    pub request_delay: Duration,
    pub media: MediaRequirement,
}

impl ProviderDescriptor {
    /// Apply configured overrides on top of the built-in defaults.
    pub fn with_overrides(mut self, settings: &ProviderSettings) -> Self {
        if let Some(partitions) = settings.partitions.as_ref().filter(|p| !p.is_empty()) {
            self.partitions = partitions.clone();
        }
        if let Some(per_run) = settings.partitions_per_run.filter(|n| *n > 0) {
            self.partitions_per_run = per_run;
        }
        if let Some(page_size) = settings.page_size.filter(|n| *n > 0) {
            self.page_size = page_size;
        }
        if let Some(delay_ms) = settings.request_delay_ms {
            self.request_delay = Duration::from_millis(delay_ms);
        }
        self
    }
}

pub(crate) fn partitions(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

/// Result of one adapter invocation.
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    pub provider_key: &'static str,
    pub records: Vec<CatalogRecord>,
    /// One human-readable entry per failed partition (or setup problem).
    pub errors: Vec<String>,
    pub progress: ProviderProgress,
    /// Raw items returned by the provider, before any filtering.
    pub fetched: usize,
}

/// A provider as seen by the orchestrator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn key(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Whether the adapter can query its provider at all (credential present,
    /// partitions configured).
    fn is_usable(&self) -> bool {
        true
    }

    /// Fetch this run's partitions, resuming from `progress`.
    ///
    /// Never fails as a whole: partition failures end up in
    /// [`AdapterOutput::errors`].
    async fn fetch(&self, progress: ProviderProgress) -> AdapterOutput;
}

/// Provider-specific half of an adapter: one page request plus normalization.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Raw item as decoded from the provider's JSON.
    type Item: Send;

    fn descriptor(&self) -> &ProviderDescriptor;

    /// Explanation when a required credential is absent.
    fn missing_credential(&self) -> Option<String> {
        None
    }

    /// Fetch one page of `partition` starting at item `offset`.
    ///
    /// An empty vector means the partition is exhausted.
    async fn fetch_page(&self, partition: &str, offset: u32)
        -> Result<Vec<Self::Item>, ProviderError>;

    /// Map a raw item to a record, or `None` when mandatory fields are missing.
    fn normalize(&self, item: Self::Item, partition: &str) -> Option<CatalogRecord>;

    /// Offset to resume from after a non-empty page of `returned` items.
    fn next_offset(&self, offset: u32, returned: usize) -> u32 {
        offset.saturating_add(returned as u32)
    }
}

/// Adapter driving a [`PageSource`] through its rotating partitions.
pub struct PartitionedAdapter<S> {
    source: S,
}

impl<S: PageSource> PartitionedAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: PageSource> ProviderAdapter for PartitionedAdapter<S> {
    fn key(&self) -> &'static str {
        self.source.descriptor().key
    }

    fn name(&self) -> &'static str {
        self.source.descriptor().name
    }

    fn is_usable(&self) -> bool {
        self.source.missing_credential().is_none() && !self.source.descriptor().partitions.is_empty()
    }

    async fn fetch(&self, prior: ProviderProgress) -> AdapterOutput {
        let descriptor = self.source.descriptor();
        let mut output = AdapterOutput {
            provider_key: descriptor.key,
            records: Vec::new(),
            errors: Vec::new(),
            progress: prior.clone(),
            fetched: 0,
        };

        if let Some(reason) = self.source.missing_credential() {
            warn!("{}: {}", descriptor.name, reason);
            output.errors.push(reason);
            return output;
        }
        if descriptor.partitions.is_empty() {
            output.errors.push("no partitions configured".to_string());
            return output;
        }

        let selected = rotation::select_partitions(
            descriptor.partitions.len(),
            prior.rotation_index,
            descriptor.partitions_per_run,
        );
        let mut progress = prior.clone();
        let mut seen_ids = HashSet::new();

        for (position, partition_index) in selected.iter().enumerate() {
            if position > 0 && !descriptor.request_delay.is_zero() {
                tokio::time::sleep(descriptor.request_delay).await;
            }

            let partition = &descriptor.partitions[*partition_index];
            let offset = progress.offset_for(partition);

            match self.source.fetch_page(partition, offset).await {
                Ok(items) if items.is_empty() => {
                    info!(
                        "{}: partition '{}' exhausted at offset {}, restarting from 0 next time",
                        descriptor.name, partition, offset
                    );
                    progress.offsets.insert(partition.clone(), 0);
                }
                Ok(items) => {
                    let returned = items.len();
                    output.fetched += returned;
                    let mut kept = 0usize;
                    for item in items {
                        let Some(record) = self.source.normalize(item, partition) else {
                            continue;
                        };
                        if !descriptor.media.is_satisfied_by(&record) {
                            debug!("{}: dropping {} without media", descriptor.name, record.id);
                            continue;
                        }
                        if seen_ids.insert(record.id.clone()) {
                            output.records.push(record);
                            kept += 1;
                        }
                    }
                    let next = self.source.next_offset(offset, returned);
                    progress.offsets.insert(partition.clone(), next);
                    info!(
                        "{}: partition '{}' offset {} → {}: {} items, {} kept",
                        descriptor.name, partition, offset, next, returned, kept
                    );
                }
                Err(e) => {
                    warn!(
                        "{}: partition '{}' failed at offset {}: {}",
                        descriptor.name, partition, offset, e
                    );
                    output
                        .errors
                        .push(format!("{} [{}]: {}", descriptor.key, partition, e));
                }
            }
        }

        progress.rotation_index = rotation::advance(
            prior.rotation_index,
            descriptor.partitions_per_run,
            descriptor.partitions.len(),
        );
        progress.last_run_at = Some(Utc::now());
        output.progress = progress;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{record_id, title_index};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct FakeItem {
        id: &'static str,
        title: &'static str,
        audio: bool,
        artwork: bool,
    }

    fn item(id: &'static str, audio: bool, artwork: bool) -> FakeItem {
        FakeItem {
            id,
            title: "Song",
            audio,
            artwork,
        }
    }

    struct FakeSource {
        descriptor: ProviderDescriptor,
        pages: HashMap<(String, u32), Result<Vec<FakeItem>, u16>>,
        requests: Mutex<Vec<(String, u32)>>,
        credential: Option<String>,
    }

    impl FakeSource {
        fn new(partitions: &[&str], per_run: usize) -> Self {
            Self {
                descriptor: ProviderDescriptor {
                    key: "fake",
                    name: "Fake",
                    id_prefix: "fake",
                    partitions: super::partitions(partitions),
                    partitions_per_run: per_run,
                    page_size: 10,
                    request_delay: Duration::ZERO,
                    media: MediaRequirement::AudioOrArtwork,
                },
                pages: HashMap::new(),
                requests: Mutex::new(Vec::new()),
                credential: Some("token".to_string()),
            }
        }

        fn page(mut self, partition: &str, offset: u32, page: Result<Vec<FakeItem>, u16>) -> Self {
            self.pages.insert((partition.to_string(), offset), page);
            self
        }

        fn requests(&self) -> Vec<(String, u32)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        type Item = FakeItem;

        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        fn missing_credential(&self) -> Option<String> {
            match self.credential {
                Some(_) => None,
                None => Some("no token configured".to_string()),
            }
        }

        async fn fetch_page(
            &self,
            partition: &str,
            offset: u32,
        ) -> Result<Vec<FakeItem>, ProviderError> {
            self.requests
                .lock()
                .unwrap()
                .push((partition.to_string(), offset));
            match self.pages.get(&(partition.to_string(), offset)) {
                Some(Ok(items)) => Ok(items.clone()),
                Some(Err(status)) => Err(ProviderError::Status {
                    status: *status,
                    url: "http://fake".to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }

        fn normalize(&self, item: FakeItem, partition: &str) -> Option<CatalogRecord> {
            Some(CatalogRecord {
                id: record_id("fake", item.id),
                title: item.title.to_string(),
                title_lower: title_index(item.title),
                artist: "Artist".to_string(),
                audio_ref: if item.audio { "https://a".into() } else { String::new() },
                artwork_ref: if item.artwork { "https://i".into() } else { String::new() },
                genre: partition.to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_advances_rotation_and_offsets() {
        let source = FakeSource::new(&["rock", "jazz", "pop"], 2)
            .page("rock", 0, Ok(vec![item("1", true, false), item("2", false, true)]))
            .page("jazz", 0, Ok(vec![item("3", true, true)]));
        let adapter = PartitionedAdapter::new(source);

        let output = adapter.fetch(ProviderProgress::default()).await;

        assert_eq!(output.fetched, 3);
        assert_eq!(output.records.len(), 3);
        assert!(output.errors.is_empty());
        assert_eq!(output.progress.rotation_index, 2);
        assert_eq!(output.progress.offset_for("rock"), 2);
        assert_eq!(output.progress.offset_for("jazz"), 1);
        assert!(output.progress.last_run_at.is_some());
        assert_eq!(
            adapter.source().requests(),
            vec![("rock".to_string(), 0), ("jazz".to_string(), 0)]
        );
    }

    #[tokio::test]
    async fn test_fetch_resumes_from_stored_offsets() {
        let source = FakeSource::new(&["rock", "jazz", "pop"], 2)
            .page("pop", 5, Ok(vec![item("9", true, false)]));
        let adapter = PartitionedAdapter::new(source);
        let mut prior = ProviderProgress {
            rotation_index: 2,
            ..Default::default()
        };
        prior.offsets.insert("pop".to_string(), 5);
        prior.offsets.insert("rock".to_string(), 7);

        let output = adapter.fetch(prior).await;

        assert_eq!(
            adapter.source().requests(),
            vec![("pop".to_string(), 5), ("rock".to_string(), 7)]
        );
        assert_eq!(output.progress.offset_for("pop"), 6);
        // rock returned nothing at 7: exhausted, restart from the beginning
        assert_eq!(output.progress.offset_for("rock"), 0);
        assert_eq!(output.progress.rotation_index, 1);
    }

    #[tokio::test]
    async fn test_partition_failure_does_not_abort() {
        let source = FakeSource::new(&["rock", "jazz"], 2)
            .page("rock", 0, Err(503))
            .page("jazz", 0, Ok(vec![item("1", true, false)]));
        let adapter = PartitionedAdapter::new(source);
        let mut prior = ProviderProgress::default();
        prior.offsets.insert("rock".to_string(), 0);

        let output = adapter.fetch(prior).await;

        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].contains("rock"));
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.progress.offset_for("rock"), 0);
        assert_eq!(output.progress.offset_for("jazz"), 1);
    }

    #[tokio::test]
    async fn test_drops_items_without_media_and_duplicates() {
        let source = FakeSource::new(&["rock"], 1).page(
            "rock",
            0,
            Ok(vec![
                item("1", true, false),
                item("2", false, false),
                item("1", true, true),
                item("3", false, true),
            ]),
        );
        let adapter = PartitionedAdapter::new(source);

        let output = adapter.fetch(ProviderProgress::default()).await;

        let ids: Vec<_> = output.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["fake-1", "fake-3"]);
        assert_eq!(output.fetched, 4);
        assert_eq!(output.progress.offset_for("rock"), 4);
    }

    #[tokio::test]
    async fn test_missing_credential_reports_error_without_requests() {
        let mut source = FakeSource::new(&["rock"], 1);
        source.credential = None;
        let adapter = PartitionedAdapter::new(source);
        let prior = ProviderProgress {
            rotation_index: 0,
            ..Default::default()
        };

        let output = adapter.fetch(prior.clone()).await;

        assert!(!adapter.is_usable());
        assert!(output.records.is_empty());
        assert_eq!(output.errors, vec!["no token configured".to_string()]);
        assert_eq!(output.progress, prior);
        assert!(adapter.source().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_partitions_only() {
        let mut source = FakeSource::new(&["a", "b", "c"], 3);
        source.descriptor.request_delay = Duration::from_millis(500);
        let adapter = PartitionedAdapter::new(source);

        let started = tokio::time::Instant::now();
        adapter.fetch(ProviderProgress::default()).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[test]
    fn test_descriptor_overrides() {
        let descriptor = FakeSource::new(&["a"], 1).descriptor.with_overrides(&ProviderSettings {
            partitions: Some(vec!["x".to_string(), "y".to_string()]),
            partitions_per_run: Some(2),
            page_size: Some(0),
            request_delay_ms: Some(10),
            ..Default::default()
        });
        assert_eq!(descriptor.partitions, vec!["x", "y"]);
        assert_eq!(descriptor.partitions_per_run, 2);
        assert_eq!(descriptor.page_size, 10);
        assert_eq!(descriptor.request_delay, Duration::from_millis(10));
    }
}
