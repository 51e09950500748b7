//! Openverse audio search, queried by search strings with page-number paging.
//!
//! Openverse answers a page past the end of the result set with `400`, which
//! is treated as exhaustion rather than a failure.

use super::lenient::{lenient_i64, lenient_string, lenient_vec, string_or_number};
use super::{partitions, MediaRequirement, PageSource, ProviderDescriptor, ProviderError, ProviderHttp};
use crate::catalog::{record_id, title_index, CatalogRecord, Provenance};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const OPENVERSE_API_BASE: &str = "https://api.openverse.org/v1";
const REQUEST_DELAY: Duration = Duration::from_millis(600);

pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        key: "openverse",
        name: "Openverse",
        id_prefix: "openverse",
        partitions: partitions(&[
            "piano",
            "guitar",
            "synth",
            "nature",
            "orchestral",
            "beats",
            "vocal",
            "field recording",
        ]),
        partitions_per_run: 2,
        page_size: 20,
        request_delay: REQUEST_DELAY,
        media: MediaRequirement::AudioOrArtwork,
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<OpenverseAudio>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct OpenverseAudio {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    creator: String,
    #[serde(deserialize_with = "lenient_string")]
    creator_url: String,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(deserialize_with = "lenient_string")]
    thumbnail: String,
    /// Milliseconds.
    #[serde(deserialize_with = "lenient_i64")]
    duration: i64,
    #[serde(deserialize_with = "lenient_vec")]
    genres: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    license: String,
    #[serde(deserialize_with = "lenient_string")]
    license_version: String,
    #[serde(deserialize_with = "lenient_string")]
    foreign_landing_url: String,
    audio_set: Option<AudioSet>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AudioSet {
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    foreign_identifier: String,
}

pub struct OpenverseSource {
    http: ProviderHttp,
    descriptor: ProviderDescriptor,
    base_url: String,
    token: Option<String>,
}

impl OpenverseSource {
    /// Anonymous access works with a lower rate limit; `token` is optional.
    pub fn new(
        http: ProviderHttp,
        descriptor: ProviderDescriptor,
        base_url: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            http,
            descriptor,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn page_number(&self, offset: u32) -> u32 {
        offset / self.descriptor.page_size.max(1) + 1
    }
}

#[async_trait]
impl PageSource for OpenverseSource {
    type Item = OpenverseAudio;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<OpenverseAudio>, ProviderError> {
        let url = format!("{}/audio/", self.base_url);
        let query = [
            ("q", partition.to_string()),
            ("page", self.page_number(offset).to_string()),
            ("page_size", self.descriptor.page_size.to_string()),
        ];
        match self
            .http
            .get_json::<SearchResponse>(&url, &query, self.token.as_deref())
            .await
        {
            Ok(page) => Ok(page.map(|p| p.results).unwrap_or_default()),
            Err(ProviderError::Status { status: 400, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn normalize(&self, audio: OpenverseAudio, partition: &str) -> Option<CatalogRecord> {
        normalize_audio(audio, self.descriptor.id_prefix, partition)
    }

    /// Offsets move in whole pages so the page number stays aligned even when
    /// the last page is short.
    fn next_offset(&self, offset: u32, _returned: usize) -> u32 {
        offset.saturating_add(self.descriptor.page_size)
    }
}

fn normalize_audio(audio: OpenverseAudio, id_prefix: &str, partition: &str) -> Option<CatalogRecord> {
    let native_id = audio.id.trim();
    let title = audio.title.trim();
    if native_id.is_empty() || title.is_empty() {
        return None;
    }

    let license_description = match (audio.license.trim(), audio.license_version.trim()) {
        ("", _) => String::new(),
        (license, "") => format!("CC {}", license.to_uppercase()),
        (license, version) => format!("CC {} {}", license.to_uppercase(), version),
    };
    let (album, album_id) = audio
        .audio_set
        .map(|set| (set.title.trim().to_string(), set.foreign_identifier))
        .unwrap_or_default();
    let genre = audio
        .genres
        .into_iter()
        .find(|g| !g.trim().is_empty())
        .unwrap_or_else(|| partition.to_string());

    Some(CatalogRecord {
        id: record_id(id_prefix, native_id),
        title: title.to_string(),
        title_lower: title_index(title),
        artist: audio.creator.trim().to_string(),
        artist_id: audio.creator_url.trim().to_string(),
        album,
        album_id,
        duration_seconds: audio.duration.max(0).saturating_add(500) / 1000,
        artwork_ref: audio.thumbnail.trim().to_string(),
        audio_ref: audio.url.trim().to_string(),
        genre,
        license_description,
        provenance: Provenance {
            provider_name: "Openverse".to_string(),
            provider_url: audio.foreign_landing_url.trim().to_string(),
        },
    })
}
