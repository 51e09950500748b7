//! MusicBrainz recording search by tag. Metadata only, records carry no media.
//!
//! MusicBrainz allows one request per second per client, hence the longer
//! delay between partitions.

use super::lenient::{lenient_i64, lenient_string, lenient_vec};
use super::{partitions, MediaRequirement, PageSource, ProviderDescriptor, ProviderError, ProviderHttp};
use crate::catalog::{record_id, title_index, CatalogRecord, Provenance};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";
const MUSICBRAINZ_SITE: &str = "https://musicbrainz.org";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(1100);

pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        key: "musicbrainz",
        name: "MusicBrainz",
        id_prefix: "mb",
        partitions: partitions(&[
            "rock",
            "jazz",
            "electronic",
            "folk",
            "classical",
            "hip hop",
            "blues",
            "reggae",
            "soul",
            "punk",
        ]),
        partitions_per_run: 3,
        page_size: 25,
        request_delay: RATE_LIMIT_INTERVAL,
        media: MediaRequirement::None,
    }
}

#[derive(Deserialize)]
struct RecordingSearchResponse {
    #[serde(default)]
    recordings: Vec<MbRecording>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct MbRecording {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    /// Milliseconds.
    #[serde(deserialize_with = "lenient_i64")]
    length: i64,
    #[serde(rename = "artist-credit", deserialize_with = "lenient_vec")]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(deserialize_with = "lenient_vec")]
    releases: Vec<MbRelease>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MbArtistCredit {
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    joinphrase: String,
    artist: Option<MbArtist>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MbArtist {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MbRelease {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
}

pub struct MusicBrainzSource {
    http: ProviderHttp,
    descriptor: ProviderDescriptor,
    base_url: String,
}

impl MusicBrainzSource {
    pub fn new(http: ProviderHttp, descriptor: ProviderDescriptor, base_url: &str) -> Self {
        Self {
            http,
            descriptor,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PageSource for MusicBrainzSource {
    type Item = MbRecording;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<MbRecording>, ProviderError> {
        let url = format!("{}/recording", self.base_url);
        let query = [
            ("query", format!("tag:\"{}\"", partition)),
            ("fmt", "json".to_string()),
            ("limit", self.descriptor.page_size.to_string()),
            ("offset", offset.to_string()),
        ];
        let page: Option<RecordingSearchResponse> = self.http.get_json(&url, &query, None).await?;
        Ok(page.map(|p| p.recordings).unwrap_or_default())
    }

    fn normalize(&self, recording: MbRecording, partition: &str) -> Option<CatalogRecord> {
        normalize_recording(recording, self.descriptor.id_prefix, partition)
    }
}

/// Joins the credited names with their join phrases ("A feat. B").
fn credited_artist(credits: &[MbArtistCredit]) -> String {
    let mut joined = String::new();
    for credit in credits {
        let name = if credit.name.is_empty() {
            credit.artist.as_ref().map(|a| a.name.as_str()).unwrap_or("")
        } else {
            credit.name.as_str()
        };
        joined.push_str(name);
        joined.push_str(&credit.joinphrase);
    }
    joined.trim().to_string()
}

fn normalize_recording(recording: MbRecording, id_prefix: &str, partition: &str) -> Option<CatalogRecord> {
    let native_id = recording.id.trim();
    let title = recording.title.trim();
    if native_id.is_empty() || title.is_empty() {
        return None;
    }

    let artist_id = recording
        .artist_credit
        .first()
        .and_then(|credit| credit.artist.as_ref())
        .map(|artist| artist.id.clone())
        .unwrap_or_default();
    let release = recording.releases.into_iter().next().unwrap_or_default();

    Some(CatalogRecord {
        id: record_id(id_prefix, native_id),
        title: title.to_string(),
        title_lower: title_index(title),
        artist: credited_artist(&recording.artist_credit),
        artist_id,
        album: release.title.trim().to_string(),
        album_id: release.id,
        duration_seconds: recording.length.max(0) / 1000,
        artwork_ref: String::new(),
        audio_ref: String::new(),
        genre: partition.to_string(),
        license_description: String::new(),
        provenance: Provenance {
            provider_name: "MusicBrainz".to_string(),
            provider_url: format!("{}/recording/{}", MUSICBRAINZ_SITE, native_id),
        },
    })
}
