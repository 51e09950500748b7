mod file_config;

pub use file_config::{AssetsConfig, ChunkConfig, FileConfig, ProviderSettings};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str =
    "catalog-ingest/0.1 (https://github.com/catalog-ingest/catalog-ingest)";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3001/media";
/// One year.
pub const MAX_INTERVAL_HOURS: u64 = 24 * 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("db_dir must be specified via --db-dir or in config file")]
    MissingDbDir,

    #[error("Database directory does not exist: {0:?}")]
    DbDirNotFound(PathBuf),

    #[error("db_dir is not a directory: {0:?}")]
    DbDirNotADirectory(PathBuf),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("No usable provider is configured (every provider is disabled or lacks a required credential)")]
    NoUsableProviders,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub dry_run: bool,
    pub max_records: Option<usize>,
    pub interval_hours: u64,
    pub user_agent: Option<String>,
    pub http_timeout_sec: u64,
    pub jamendo_client_id: Option<String>,
    pub audius_app_name: Option<String>,
    pub openverse_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub media_dir: PathBuf,
    pub public_base_url: String,
    pub dry_run: bool,
    pub max_records: Option<usize>,
    /// `0` means a single run.
    pub interval_hours: u64,
    pub user_agent: String,
    pub http_timeout: Duration,

    // Stage settings (with defaults)
    pub assets: AssetSettings,
    pub writer_chunk_size: usize,
    pub dedup_chunk_size: usize,

    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetSettings {
    /// Records migrated concurrently in one window.
    pub concurrency: usize,
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(60),
        }
    }
}

pub const DEFAULT_WRITER_CHUNK_SIZE: usize = 500;
pub const DEFAULT_DEDUP_CHUNK_SIZE: usize = 100;
const DEFAULT_HTTP_TIMEOUT_SEC: u64 = 30;

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self, ConfigError> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or(ConfigError::MissingDbDir)?;

        if !db_dir.exists() {
            return Err(ConfigError::DbDirNotFound(db_dir));
        }
        if !db_dir.is_dir() {
            return Err(ConfigError::DbDirNotADirectory(db_dir));
        }

        let media_dir = file
            .media_dir
            .map(PathBuf::from)
            .or_else(|| cli.media_dir.clone())
            .unwrap_or_else(|| db_dir.join("media"));

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !public_base_url.starts_with("http://") && !public_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "public_base_url",
                reason: format!("'{}' is not an http(s) URL", public_base_url),
            });
        }

        let dry_run = file.dry_run.unwrap_or(cli.dry_run);
        let max_records = file.max_records.or(cli.max_records);
        let interval_hours = file.interval_hours.unwrap_or(cli.interval_hours);
        if interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::Invalid {
                field: "interval_hours",
                reason: format!("{} exceeds the maximum of {}", interval_hours, MAX_INTERVAL_HOURS),
            });
        }
        let user_agent = file
            .user_agent
            .or_else(|| cli.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let http_timeout_sec = match file.http_timeout_sec.unwrap_or(cli.http_timeout_sec) {
            0 => DEFAULT_HTTP_TIMEOUT_SEC,
            secs => secs,
        };

        let assets_file = file.assets.unwrap_or_default();
        let asset_defaults = AssetSettings::default();
        let assets = AssetSettings {
            concurrency: positive("assets.concurrency", assets_file.concurrency)?
                .unwrap_or(asset_defaults.concurrency),
            max_retries: assets_file.max_retries.unwrap_or(asset_defaults.max_retries),
            retry_base_delay: assets_file
                .retry_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(asset_defaults.retry_base_delay),
            timeout: assets_file
                .timeout_sec
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(asset_defaults.timeout),
        };

        let writer_chunk_size = positive("writer.chunk_size", file.writer.and_then(|w| w.chunk_size))?
            .unwrap_or(DEFAULT_WRITER_CHUNK_SIZE);
        let dedup_chunk_size = positive("dedup.chunk_size", file.dedup.and_then(|d| d.chunk_size))?
            .unwrap_or(DEFAULT_DEDUP_CHUNK_SIZE);

        // Credentials from CLI/env fill in where the file has none
        let mut providers = file.providers;
        for (key, credential) in [
            ("jamendo", &cli.jamendo_client_id),
            ("audius", &cli.audius_app_name),
            ("openverse", &cli.openverse_token),
        ] {
            if let Some(credential) = credential {
                let settings = providers.entry(key.to_string()).or_default();
                if settings.credential.is_none() {
                    settings.credential = Some(credential.clone());
                }
            }
        }

        Ok(Self {
            db_dir,
            media_dir,
            public_base_url,
            dry_run,
            max_records,
            interval_hours,
            user_agent,
            http_timeout: Duration::from_secs(http_timeout_sec),
            assets,
            writer_chunk_size,
            dedup_chunk_size,
            providers,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    /// Settings for `key`, defaults when the provider is not mentioned.
    pub fn provider(&self, key: &str) -> ProviderSettings {
        self.providers.get(key).cloned().unwrap_or_default()
    }
}

fn positive(field: &'static str, value: Option<usize>) -> Result<Option<usize>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            public_base_url: Some("https://cdn.example.com/media/".to_string()),
            dry_run: true,
            max_records: Some(10),
            interval_hours: 6,
            http_timeout_sec: 15,
            jamendo_client_id: Some("client".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.media_dir, temp_dir.path().join("media"));
        assert_eq!(config.catalog_db_path(), temp_dir.path().join("catalog.db"));
        assert_eq!(config.public_base_url, "https://cdn.example.com/media");
        assert!(config.dry_run);
        assert_eq!(config.max_records, Some(10));
        assert_eq!(config.interval_hours, 6);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.assets, AssetSettings::default());
        assert_eq!(config.writer_chunk_size, 500);
        assert_eq!(config.dedup_chunk_size, 100);
        assert_eq!(
            config.provider("jamendo").credential.as_deref(),
            Some("client")
        );
        assert_eq!(config.provider("audius"), ProviderSettings::default());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            media_dir: Some(PathBuf::from("/cli/media")),
            max_records: Some(5),
            jamendo_client_id: Some("from-cli".to_string()),
            openverse_token: Some("ov-token".to_string()),
            ..Default::default()
        };

        let mut providers = BTreeMap::new();
        providers.insert(
            "jamendo".to_string(),
            ProviderSettings {
                credential: Some("from-file".to_string()),
                ..Default::default()
            },
        );
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            media_dir: Some("/toml/media".to_string()),
            dry_run: Some(true),
            assets: Some(AssetsConfig {
                concurrency: Some(2),
                retry_base_delay_ms: Some(10),
                ..Default::default()
            }),
            writer: Some(ChunkConfig {
                chunk_size: Some(50),
            }),
            providers,
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.media_dir, PathBuf::from("/toml/media"));
        assert!(config.dry_run);
        assert_eq!(config.assets.concurrency, 2);
        assert_eq!(config.assets.retry_base_delay, Duration::from_millis(10));
        assert_eq!(config.assets.max_retries, 2);
        assert_eq!(config.writer_chunk_size, 50);
        assert_eq!(
            config.provider("jamendo").credential.as_deref(),
            Some("from-file")
        );
        // CLI value used when TOML doesn't specify
        assert_eq!(config.max_records, Some(5));
        assert_eq!(
            config.provider("openverse").credential.as_deref(),
            Some("ov-token")
        );
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(matches!(result, Err(ConfigError::MissingDbDir)));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(matches!(result, Err(ConfigError::DbDirNotADirectory(_))));
    }

    #[test]
    fn test_resolve_rejects_zero_chunk_size() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let file_config = FileConfig {
            dedup: Some(ChunkConfig {
                chunk_size: Some(0),
            }),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, Some(file_config));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "dedup.chunk_size",
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_rejects_non_http_base_url() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            public_base_url: Some("store://bucket".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(&cli, None),
            Err(ConfigError::Invalid {
                field: "public_base_url",
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_rejects_huge_interval() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            interval_hours: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            AppConfig::resolve(&cli, None),
            Err(ConfigError::Invalid {
                field: "interval_hours",
                ..
            })
        ));

        let cli = CliConfig {
            interval_hours: MAX_INTERVAL_HOURS,
            ..cli
        };
        assert_eq!(AppConfig::resolve(&cli, None).unwrap().interval_hours, MAX_INTERVAL_HOURS);
    }
}
