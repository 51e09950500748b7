//! ccMixter query API, queried by upload tag. Audio only, no artwork.

use super::lenient::{first_non_empty, lenient_string, lenient_vec, string_or_number};
use super::{partitions, MediaRequirement, PageSource, ProviderDescriptor, ProviderError, ProviderHttp};
use crate::catalog::{record_id, title_index, CatalogRecord, Provenance};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const CCMIXTER_API_BASE: &str = "https://ccmixter.org/api";
const REQUEST_DELAY: Duration = Duration::from_millis(400);

pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        key: "ccmixter",
        name: "ccMixter",
        id_prefix: "ccmixter",
        partitions: partitions(&[
            "instrumental",
            "electronic",
            "hip_hop",
            "ambient",
            "rock",
            "experimental",
            "chill",
            "vocals",
        ]),
        partitions_per_run: 2,
        page_size: 40,
        request_delay: REQUEST_DELAY,
        media: MediaRequirement::AudioOrArtwork,
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CcUpload {
    #[serde(deserialize_with = "string_or_number")]
    upload_id: String,
    #[serde(deserialize_with = "lenient_string")]
    upload_name: String,
    #[serde(deserialize_with = "lenient_string")]
    user_name: String,
    #[serde(deserialize_with = "lenient_string")]
    user_real_name: String,
    #[serde(deserialize_with = "lenient_string")]
    file_page_url: String,
    #[serde(deserialize_with = "lenient_string")]
    license_name: String,
    #[serde(deserialize_with = "lenient_string")]
    license_url: String,
    #[serde(deserialize_with = "lenient_vec")]
    files: Vec<CcFile>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CcFile {
    #[serde(deserialize_with = "lenient_string")]
    download_url: String,
    file_format_info: Option<CcFormatInfo>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CcFormatInfo {
    #[serde(deserialize_with = "lenient_string")]
    mime_type: String,
    /// Playing time as "m:ss" or "h:mm:ss".
    #[serde(deserialize_with = "lenient_string")]
    ps: String,
}

impl CcFile {
    fn is_audio(&self) -> bool {
        self.file_format_info
            .as_ref()
            .map(|info| info.mime_type.starts_with("audio/"))
            .unwrap_or(false)
    }
}

/// Parses "m:ss" / "h:mm:ss" into seconds, `0` when malformed.
fn parse_play_time(text: &str) -> i64 {
    let mut total = 0i64;
    for part in text.trim().split(':') {
        match part.trim().parse::<i64>() {
            Ok(value) if value >= 0 => {
                match total.checked_mul(60).and_then(|t| t.checked_add(value)) {
                    Some(next) => total = next,
                    None => return 0,
                }
            }
            _ => return 0,
        }
    }
    total
}

pub struct CcMixterSource {
    http: ProviderHttp,
    descriptor: ProviderDescriptor,
    base_url: String,
}

impl CcMixterSource {
    pub fn new(http: ProviderHttp, descriptor: ProviderDescriptor, base_url: &str) -> Self {
        Self {
            http,
            descriptor,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PageSource for CcMixterSource {
    type Item = CcUpload;

    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn fetch_page(&self, partition: &str, offset: u32) -> Result<Vec<CcUpload>, ProviderError> {
        let url = format!("{}/query", self.base_url);
        let query = [
            ("f", "json".to_string()),
            ("tags", partition.to_string()),
            ("limit", self.descriptor.page_size.to_string()),
            ("offset", offset.to_string()),
            ("sort", "rank".to_string()),
        ];
        let page: Option<Vec<CcUpload>> = self.http.get_json(&url, &query, None).await?;
        Ok(page.unwrap_or_default())
    }

    fn normalize(&self, upload: CcUpload, partition: &str) -> Option<CatalogRecord> {
        normalize_upload(upload, self.descriptor.id_prefix, partition)
    }
}

fn normalize_upload(upload: CcUpload, id_prefix: &str, partition: &str) -> Option<CatalogRecord> {
    let native_id = upload.upload_id.trim();
    let title = upload.upload_name.trim();
    if native_id.is_empty() || title.is_empty() {
        return None;
    }

    let audio_file = upload
        .files
        .iter()
        .find(|file| file.is_audio() && !file.download_url.trim().is_empty());
    let duration_seconds = audio_file
        .and_then(|file| file.file_format_info.as_ref())
        .map(|info| parse_play_time(&info.ps))
        .unwrap_or(0);
    let audio_ref = audio_file
        .map(|file| file.download_url.trim().to_string())
        .unwrap_or_default();

    Some(CatalogRecord {
        id: record_id(id_prefix, native_id),
        title: title.to_string(),
        title_lower: title_index(title),
        artist: first_non_empty([upload.user_real_name.as_str(), upload.user_name.as_str()]),
        artist_id: upload.user_name.trim().to_string(),
        album: String::new(),
        album_id: String::new(),
        duration_seconds,
        artwork_ref: String::new(),
        audio_ref,
        genre: partition.replace('_', " "),
        license_description: first_non_empty([
            upload.license_name.as_str(),
            upload.license_url.as_str(),
        ]),
        provenance: Provenance {
            provider_name: "ccMixter".to_string(),
            provider_url: upload.file_page_url.trim().to_string(),
        },
    })
}
