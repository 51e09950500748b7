//! Audius discovery-node track search, queried by free-text search strings.

use super::lenient::{first_non_empty, lenient_i64, lenient_string, string_or_number};
use super::{partitions, MediaRequirement, PageSource, ProviderDescriptor, ProviderError, ProviderHttp};
use crate::catalog::{record_id, title_index, CatalogRecord, Provenance};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const AUDIUS_API_BASE: &str = "https://discoveryprovider.audius.co/v1";
const AUDIUS_SITE: &str = "https://audius.co";
const DEFAULT_APP_NAME: &str = "catalog-ingest";
const REQUEST_DELAY: Duration = Duration::from_millis(300);

pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        key: "audius",
        name: "Audius",
        id_prefix: "audius",
        partitions: partitions(&[
            "lofi",
            "house",
            "techno",
            "indie",
            "hip hop",
            "ambient",
            "drum and bass",
            "jazz",
        ]),
        partitions_per_run: 2,
        page_size: 50,
        request_delay: REQUEST_DELAY,
        media: MediaRequirement::AudioOrArtwork,
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<AudiusTrack>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AudiusTrack {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_i64")]
    duration: i64,
    #[serde(deserialize_with = "lenient_string")]
    genre: String,
    #[serde(deserialize_with = "lenient_string")]
    permalink: String,
    #[serde(deserialize_with = "lenient_string")]
    license: String,
    user: Option<AudiusUser>,
    /// Size label ("150x150", "480x480", "1000x1000") → URL.
    artwork: Option<HashMap<String, Option<String>>>,
    /// Absent means streamable.
    is_streamable: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AudiusUser {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    handle: String,
}

pub struct AudiusSource {
    http: ProviderHttp,
    descriptor: ProviderDescriptor,
    base_url: String,
    app_name: String,
}

impl AudiusSource {
    /// `app_name` is optional; Audius only uses it for attribution.
    pub fn new(
        http: ProviderHttp,
        descriptor: ProviderDescriptor,
        base_url: &str,
        app_name: Option<String>,
    ) -> Self {
        Self {
            http,
            descriptor,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_name: app_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        }
    }

    fn normalize_track(&self, track: AudiusTrack, partition: &str) -> Option<CatalogRecord> {
        let native_id = track.id.trim();
        let title = track.title.trim();
        if native_id.is_empty() || title.is_empty() {
            return None;
        }

        let user = track.user.unwrap_or_default();
        let artist = first_non_empty([user.name.as_str(), user.handle.as_str()]);

        let artwork_ref = track
            .artwork
            .map(|sizes| {
                ["480x480", "1000x1000", "150x150"]
                    .iter()
                    .filter_map(|size| sizes.get(*size).cloned().flatten())
                    .find(|url| !url.trim().is_empty())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let audio_ref = if track.is_streamable.unwrap_or(true) {
            format!(
                "{}/tracks/{}/stream?app_name={}",
                self.base_url,
                native_id,
                urlencoding::encode(&self.app_name)
            )
        } else {
            String::new()
        };

        let provider_url = match track.permalink.trim() {
            "" => String::new(),
            path if path.starts_with("http") => path.to_string(),
            path => format!("{}{}", AUDIUS_SITE, path),
        };

        Some(CatalogRecord {
            id: record_id(self.descriptor.id_prefix, native_id),
            title: title.to_string(),
            title_lower: title_index(title),
            artist,
            artist_id: user.id,
            // Audius tracks are not grouped into albums in search results
            album: String::new(),
            album_id: String::new(),
            duration_seconds: track.duration.max(0),
            artwork_ref,
            audio_ref,
            genre: first_non_empty([track.genre.as_str(), partition]),
            license_description: track.license.trim().to_string(),
            provenance: Provenance {
                provider_name: "Audius".to_string(),
                provider_url,
            },
        })
    }
}

#[async_trait]
impl PageSource for AudiusSource {
    type Item = AudiusTrack;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<AudiusTrack>, ProviderError> {
        let url = format!("{}/tracks/search", self.base_url);
        let query = [
            ("query", partition.to_string()),
            ("limit", self.descriptor.page_size.to_string()),
            ("offset", offset.to_string()),
            ("app_name", self.app_name.clone()),
        ];
        let page: Option<SearchResponse> = self.http.get_json(&url, &query, None).await?;
        Ok(page.map(|p| p.data).unwrap_or_default())
    }

    fn normalize(&self, track: AudiusTrack, partition: &str) -> Option<CatalogRecord> {
        self.normalize_track(track, partition)
    }
}
