use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_dir: Option<String>,
    pub public_base_url: Option<String>,
    pub dry_run: Option<bool>,
    pub max_records: Option<usize>,
    pub interval_hours: Option<u64>,
    pub user_agent: Option<String>,
    pub http_timeout_sec: Option<u64>,

    // Stage configs
    pub assets: Option<AssetsConfig>,
    pub writer: Option<ChunkConfig>,
    pub dedup: Option<ChunkConfig>,

    /// Keyed by provider key (`[providers.jamendo]`, ...).
    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AssetsConfig {
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: Option<usize>,
}

/// Per-provider overrides. Unset fields keep the provider's built-in default.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: Option<bool>,
    /// Client id, app name or bearer token, depending on the provider.
    pub credential: Option<String>,
    pub base_url: Option<String>,
    pub partitions: Option<Vec<String>>,
    pub partitions_per_run: Option<usize>,
    pub page_size: Option<u32>,
    pub request_delay_ms: Option<u64>,
}

impl ProviderSettings {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_dir = "/data"
dry_run = true
max_records = 250

[assets]
concurrency = 3
max_retries = 4

[writer]
chunk_size = 200

[providers.jamendo]
credential = "abc123"
partitions = ["rock", "jazz"]

[providers.musicbrainz]
enabled = false
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_dir.as_deref(), Some("/data"));
        assert_eq!(config.dry_run, Some(true));
        assert_eq!(config.max_records, Some(250));
        assert_eq!(config.assets.as_ref().unwrap().concurrency, Some(3));
        assert_eq!(config.writer.as_ref().unwrap().chunk_size, Some(200));
        assert!(config.dedup.is_none());

        let jamendo = &config.providers["jamendo"];
        assert_eq!(jamendo.credential.as_deref(), Some("abc123"));
        assert!(jamendo.is_enabled());
        assert!(!config.providers["musicbrainz"].is_enabled());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_dir = [unterminated").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/ingest.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
