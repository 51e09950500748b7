//! Shared fakes for the integration tests. No network access anywhere.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_ingest::assets::{
    AssetError, AssetFetcher, AssetMigrator, FetchedAsset, ObjectStore, RetryPolicy,
};
use catalog_ingest::catalog::{record_id, title_index, CatalogRecord, CatalogStore, Provenance};
use catalog_ingest::dedup::Deduplicator;
use catalog_ingest::pipeline::{Orchestrator, RunOptions};
use catalog_ingest::progress::ProgressStore;
use catalog_ingest::providers::{
    MediaRequirement, PageSource, PartitionedAdapter, ProviderAdapter, ProviderDescriptor,
    ProviderError,
};
use catalog_ingest::writer::BatchWriter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FakeItem {
    pub native_id: String,
    pub title: String,
    pub audio_url: String,
    pub artwork_url: String,
}

/// Item with audio and artwork hosted on `https://cdn.example.com`.
pub fn item(native_id: &str) -> FakeItem {
    FakeItem {
        native_id: native_id.to_string(),
        title: format!("Track {}", native_id),
        audio_url: format!("https://cdn.example.com/{}.mp3", native_id),
        artwork_url: format!("https://cdn.example.com/{}.jpg", native_id),
    }
}

pub fn item_without_media(native_id: &str) -> FakeItem {
    FakeItem {
        audio_url: String::new(),
        artwork_url: String::new(),
        ..item(native_id)
    }
}

/// Paged catalog served from memory, keyed by (partition, offset).
pub struct FakeCatalogSource {
    descriptor: ProviderDescriptor,
    pages: HashMap<(String, u32), Vec<FakeItem>>,
    failing: bool,
    requests: Mutex<Vec<(String, u32)>>,
}

impl FakeCatalogSource {
    pub fn new(key: &'static str, partitions: &[&str], per_run: usize) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                key,
                name: key,
                id_prefix: key,
                partitions: partitions.iter().map(|p| p.to_string()).collect(),
                partitions_per_run: per_run,
                page_size: 50,
                request_delay: Duration::ZERO,
                media: MediaRequirement::AudioOrArtwork,
            },
            pages: HashMap::new(),
            failing: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn page(mut self, partition: &str, offset: u32, items: Vec<FakeItem>) -> Self {
        self.pages.insert((partition.to_string(), offset), items);
        self
    }

    /// Every request answers with a server error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn requested_partitions(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(partition, _)| partition.clone())
            .collect()
    }
}

#[async_trait]
impl PageSource for FakeCatalogSource {
    type Item = FakeItem;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<FakeItem>, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((partition.to_string(), offset));
        if self.failing {
            return Err(ProviderError::Status {
                status: 503,
                url: format!("https://{}.example.com/search", self.descriptor.key),
            });
        }
        Ok(self
            .pages
            .get(&(partition.to_string(), offset))
            .cloned()
            .unwrap_or_default())
    }

    fn normalize(&self, item: FakeItem, partition: &str) -> Option<CatalogRecord> {
        Some(CatalogRecord {
            id: record_id(self.descriptor.id_prefix, &item.native_id),
            title_lower: title_index(&item.title),
            title: item.title,
            artist: "Fake Artist".to_string(),
            artist_id: "artist-1".to_string(),
            duration_seconds: 0,
            audio_ref: item.audio_url,
            artwork_ref: item.artwork_url,
            genre: partition.to_string(),
            provenance: Provenance {
                provider_name: self.descriptor.name.to_string(),
                provider_url: format!("https://{}.example.com", self.descriptor.key),
            },
            ..Default::default()
        })
    }
}

pub fn adapter(source: FakeCatalogSource) -> Arc<PartitionedAdapter<FakeCatalogSource>> {
    Arc::new(PartitionedAdapter::new(source))
}

/// Serves a few bytes for any URL, counting calls.
#[derive(Default)]
pub struct StaticFetcher {
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, AssetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content_type = if url.ends_with(".jpg") {
            "image/jpeg"
        } else {
            "audio/mpeg"
        };
        Ok(FetchedAsset {
            bytes: b"asset-bytes".to_vec(),
            declared_content_type: Some(content_type.to_string()),
        })
    }
}

/// Object store that is never reachable.
pub struct UnreachableObjectStore;

#[async_trait]
impl ObjectStore for UnreachableObjectStore {
    async fn put_object(&self, path: &str, _bytes: &[u8], _content_type: &str) -> Result<(), AssetError> {
        Err(AssetError::Store {
            path: path.to_string(),
            reason: "connection refused".to_string(),
        })
    }

    async fn access_token(&self, path: &str) -> Result<Option<String>, AssetError> {
        Err(AssetError::MissingObject(path.to_string()))
    }

    async fn mint_access_token(&self, path: &str) -> Result<String, AssetError> {
        Err(AssetError::MissingObject(path.to_string()))
    }

    fn public_url(&self, path: &str, token: &str) -> String {
        format!("https://objects.example.com/{}?token={}", path, token)
    }

    fn owns_url(&self, url: &str) -> bool {
        url.starts_with("https://objects.example.com/")
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
    }
}

/// Orchestrator over `catalog` with its own progress backend.
pub fn orchestrator(
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    catalog: Arc<dyn CatalogStore>,
    progress: ProgressStore,
    fetcher: Arc<dyn AssetFetcher>,
    objects: Arc<dyn ObjectStore>,
    options: RunOptions,
) -> Orchestrator {
    Orchestrator::new(
        adapters,
        progress,
        Deduplicator::new(catalog.clone(), 100),
        AssetMigrator::new(fetcher, objects, fast_retry(), 5, options.dry_run),
        BatchWriter::new(catalog, 500, options.dry_run),
        options,
    )
}
