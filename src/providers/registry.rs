//! Builds the enabled adapters from configuration.

use super::audius::{self, AudiusSource, AUDIUS_API_BASE};
use super::ccmixter::{self, CcMixterSource, CCMIXTER_API_BASE};
use super::jamendo::{self, JamendoSource, JAMENDO_API_BASE};
use super::musicbrainz::{self, MusicBrainzSource, MUSICBRAINZ_API_BASE};
use super::openverse::{self, OpenverseSource, OPENVERSE_API_BASE};
use super::{PartitionedAdapter, ProviderAdapter, ProviderHttp};
use crate::config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub const ALL_PROVIDER_KEYS: [&str; 5] = ["jamendo", "audius", "ccmixter", "openverse", "musicbrainz"];

/// One adapter per enabled provider, sharing a single HTTP client.
///
/// Providers lacking a required credential are still built; they report the
/// problem as a run error instead of being silently skipped.
pub fn build_adapters(config: &AppConfig) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
    let http = ProviderHttp::new(&config.user_agent, config.http_timeout)?;
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

    for key in ALL_PROVIDER_KEYS {
        let settings = config.provider(key);
        if !settings.is_enabled() {
            info!("Provider {} disabled by configuration", key);
            continue;
        }
        let credential = settings.credential.clone();
        let adapter: Arc<dyn ProviderAdapter> = match key {
            "jamendo" => Arc::new(PartitionedAdapter::new(JamendoSource::new(
                http.clone(),
                jamendo::descriptor().with_overrides(&settings),
                settings.base_url.as_deref().unwrap_or(JAMENDO_API_BASE),
                credential,
            ))),
            "audius" => Arc::new(PartitionedAdapter::new(AudiusSource::new(
                http.clone(),
                audius::descriptor().with_overrides(&settings),
                settings.base_url.as_deref().unwrap_or(AUDIUS_API_BASE),
                credential,
            ))),
            "ccmixter" => Arc::new(PartitionedAdapter::new(CcMixterSource::new(
                http.clone(),
                ccmixter::descriptor().with_overrides(&settings),
                settings.base_url.as_deref().unwrap_or(CCMIXTER_API_BASE),
            ))),
            "openverse" => Arc::new(PartitionedAdapter::new(OpenverseSource::new(
                http.clone(),
                openverse::descriptor().with_overrides(&settings),
                settings.base_url.as_deref().unwrap_or(OPENVERSE_API_BASE),
                credential,
            ))),
            _ => Arc::new(PartitionedAdapter::new(MusicBrainzSource::new(
                http.clone(),
                musicbrainz::descriptor().with_overrides(&settings),
                settings.base_url.as_deref().unwrap_or(MUSICBRAINZ_API_BASE),
            ))),
        };
        adapters.push(adapter);
    }

    Ok(adapters)
}
