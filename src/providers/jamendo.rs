//! Jamendo track search (`/v3.0/tracks`), queried by genre tag.

use super::lenient::{first_non_empty, lenient_i64, lenient_string, lenient_vec, string_or_number};
use super::{partitions, MediaRequirement, PageSource, ProviderDescriptor, ProviderError, ProviderHttp};
use crate::catalog::{record_id, title_index, CatalogRecord, Provenance};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const JAMENDO_API_BASE: &str = "https://api.jamendo.com/v3.0";
const REQUEST_DELAY: Duration = Duration::from_millis(500);

pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        key: "jamendo",
        name: "Jamendo",
        id_prefix: "jamendo",
        partitions: partitions(&[
            "rock",
            "pop",
            "electronic",
            "jazz",
            "classical",
            "hiphop",
            "ambient",
            "folk",
            "metal",
            "soundtrack",
        ]),
        partitions_per_run: 3,
        page_size: 50,
        request_delay: REQUEST_DELAY,
        media: MediaRequirement::AudioOrArtwork,
    }
}

#[derive(Deserialize)]
struct TracksResponse {
    #[serde(default)]
    results: Vec<JamendoTrack>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct JamendoTrack {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_i64")]
    duration: i64,
    #[serde(deserialize_with = "string_or_number")]
    artist_id: String,
    #[serde(deserialize_with = "lenient_string")]
    artist_name: String,
    #[serde(deserialize_with = "string_or_number")]
    album_id: String,
    #[serde(deserialize_with = "lenient_string")]
    album_name: String,
    #[serde(deserialize_with = "lenient_string")]
    album_image: String,
    #[serde(deserialize_with = "lenient_string")]
    image: String,
    #[serde(deserialize_with = "lenient_string")]
    audio: String,
    #[serde(deserialize_with = "lenient_string")]
    audiodownload: String,
    #[serde(deserialize_with = "lenient_string")]
    shareurl: String,
    #[serde(deserialize_with = "lenient_string")]
    license_ccurl: String,
    musicinfo: Option<MusicInfo>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MusicInfo {
    tags: Option<MusicTags>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MusicTags {
    #[serde(deserialize_with = "lenient_vec")]
    genres: Vec<String>,
}

pub struct JamendoSource {
    http: ProviderHttp,
    descriptor: ProviderDescriptor,
    base_url: String,
    client_id: Option<String>,
}

impl JamendoSource {
    pub fn new(
        http: ProviderHttp,
        descriptor: ProviderDescriptor,
        base_url: &str,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http,
            descriptor,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PageSource for JamendoSource {
    type Item = JamendoTrack;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn missing_credential(&self) -> Option<String> {
        match self.client_id {
            Some(_) => None,
            None => Some("jamendo: no client id configured, skipping".to_string()),
        }
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<JamendoTrack>, ProviderError> {
        let client_id = self.client_id.clone().unwrap_or_default();
        let url = format!("{}/tracks/", self.base_url);
        let query = [
            ("client_id", client_id),
            ("format", "json".to_string()),
            ("limit", self.descriptor.page_size.to_string()),
            ("offset", offset.to_string()),
            ("tags", partition.to_string()),
            ("include", "musicinfo".to_string()),
            ("audioformat", "mp32".to_string()),
            ("order", "popularity_total".to_string()),
        ];
        let page: Option<TracksResponse> = self.http.get_json(&url, &query, None).await?;
        Ok(page.map(|p| p.results).unwrap_or_default())
    }

    fn normalize(&self, track: JamendoTrack, partition: &str) -> Option<CatalogRecord> {
        normalize_track(track, self.descriptor.id_prefix, partition)
    }
}

/// Defaults: genre falls back to the queried tag, artwork prefers the album
/// image, audio prefers the stream URL over the download URL.
fn normalize_track(track: JamendoTrack, id_prefix: &str, partition: &str) -> Option<CatalogRecord> {
    let native_id = track.id.trim();
    let title = track.name.trim();
    if native_id.is_empty() || title.is_empty() {
        return None;
    }

    let genre = track
        .musicinfo
        .and_then(|info| info.tags)
        .and_then(|tags| tags.genres.into_iter().find(|g| !g.trim().is_empty()))
        .unwrap_or_else(|| partition.to_string());

    Some(CatalogRecord {
        id: record_id(id_prefix, native_id),
        title: title.to_string(),
        title_lower: title_index(title),
        artist: track.artist_name.trim().to_string(),
        artist_id: track.artist_id,
        album: track.album_name.trim().to_string(),
        album_id: track.album_id,
        duration_seconds: track.duration.max(0),
        artwork_ref: first_non_empty([track.album_image.as_str(), track.image.as_str()]),
        audio_ref: first_non_empty([track.audio.as_str(), track.audiodownload.as_str()]),
        genre,
        license_description: track.license_ccurl.trim().to_string(),
        provenance: Provenance {
            provider_name: "Jamendo".to_string(),
            provider_url: track.shareurl.trim().to_string(),
        },
    })
}
