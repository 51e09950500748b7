//! Normalized catalog models shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Where a record came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Human-readable provider name (e.g. "Jamendo").
    pub provider_name: String,
    /// Landing page of the track on the provider's site.
    pub provider_url: String,
}

/// A normalized track as stored in the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// `<provider prefix>-<provider native id>`, see [`record_id`].
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artist_id: String,
    pub album: String,
    pub album_id: String,
    /// Whole seconds, `0` when the provider does not report a duration.
    pub duration_seconds: i64,
    /// External URL, owned-store reference, or empty.
    pub artwork_ref: String,
    /// External URL, owned-store reference, or empty for metadata-only providers.
    pub audio_ref: String,
    pub genre: String,
    pub license_description: String,
    pub provenance: Provenance,
    /// Lower-cased title used for prefix search.
    pub title_lower: String,
}

/// Builds the catalog id for a provider-native id.
///
/// The prefix keeps ids from different providers apart, so the same native id
/// coming from two providers never collides.
pub fn record_id(prefix: &str, native_id: &str) -> String {
    format!("{}-{}", prefix, native_id.trim())
}

/// Lower-cases a title for the prefix-search column.
pub fn title_index(title: &str) -> String {
    title.trim().to_lowercase()
}

impl CatalogRecord {
    /// Provider key encoded in the id prefix, used for deterministic object paths.
    pub fn provider_prefix(&self) -> &str {
        self.id.split_once('-').map(|(prefix, _)| prefix).unwrap_or("")
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_ref.is_empty()
    }

    pub fn has_artwork(&self) -> bool {
        !self.artwork_ref.is_empty()
    }
}
