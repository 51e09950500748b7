use anyhow::{Context, Result};
use catalog_ingest::assets::{FsObjectStore, HttpAssetFetcher, RetryPolicy};
use catalog_ingest::config::{AppConfig, CliConfig, ConfigError, FileConfig};
use catalog_ingest::pipeline::Orchestrator;
use catalog_ingest::progress::ProgressStore;
use catalog_ingest::providers::build_adapters;
use catalog_ingest::ref_migration::{RefMigrationOptions, RefMigrator, DEFAULT_SCAN_PAGE_SIZE};
use catalog_ingest::SqliteCatalogStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[clap(version, about = "Ingests music catalog records from external providers")]
struct CliArgs {
    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the catalog database (catalog.db).
    #[clap(long, global = true, env = "INGEST_DB_DIR", value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Root directory of the owned object store. Defaults to <db-dir>/media.
    #[clap(long, global = true, env = "INGEST_MEDIA_DIR", value_parser = parse_path)]
    pub media_dir: Option<PathBuf>,

    /// Base URL relocated objects are publicly served from.
    #[clap(long, global = true, env = "INGEST_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Log what would happen without writing anything.
    #[clap(long, global = true)]
    pub dry_run: bool,

    /// Maximum number of records to write (or convert) per run.
    #[clap(long, global = true, env = "INGEST_MAX_RECORDS")]
    pub max_records: Option<usize>,

    /// User agent sent to providers and asset hosts.
    #[clap(long, global = true, env = "INGEST_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Timeout in seconds for provider requests.
    #[clap(long, global = true, default_value_t = 30)]
    pub http_timeout_sec: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion pipeline.
    Run {
        /// Hours between runs. 0 runs once and exits.
        #[clap(long, env = "INGEST_INTERVAL_HOURS", default_value_t = 0)]
        interval_hours: u64,

        /// Jamendo API client id.
        #[clap(long, env = "JAMENDO_CLIENT_ID")]
        jamendo_client_id: Option<String>,

        /// Audius app name used for attribution.
        #[clap(long, env = "AUDIUS_APP_NAME")]
        audius_app_name: Option<String>,

        /// Openverse API bearer token.
        #[clap(long, env = "OPENVERSE_TOKEN")]
        openverse_token: Option<String>,
    },

    /// Rewrite internal store:// references into public token URLs.
    MigrateRefs {
        /// Records fetched per catalog page.
        #[clap(long, default_value_t = DEFAULT_SCAN_PAGE_SIZE)]
        page_size: usize,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        let mut cli = CliConfig {
            db_dir: self.db_dir.clone(),
            media_dir: self.media_dir.clone(),
            public_base_url: self.public_base_url.clone(),
            dry_run: self.dry_run,
            max_records: self.max_records,
            user_agent: self.user_agent.clone(),
            http_timeout_sec: self.http_timeout_sec,
            ..Default::default()
        };
        if let Command::Run {
            interval_hours,
            jamendo_client_id,
            audius_app_name,
            openverse_token,
        } = &self.command
        {
            cli.interval_hours = *interval_hours;
            cli.jamendo_client_id = jamendo_client_id.clone();
            cli.audius_app_name = audius_app_name.clone();
            cli.openverse_token = openverse_token.clone();
        }
        cli
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli_args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                eprintln!("Configuration error: {}", config_error);
            } else {
                error!("{:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;
    Ok(())
}

async fn run(cli_args: CliArgs) -> Result<()> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let catalog = open_catalog(&config)?;
    let objects = Arc::new(FsObjectStore::new(&config.media_dir, &config.public_base_url));

    match cli_args.command {
        Command::Run { .. } => run_ingestion(&config, catalog, objects).await,
        Command::MigrateRefs { page_size } => {
            let options = RefMigrationOptions {
                dry_run: config.dry_run,
                max_records: config.max_records,
                page_size,
            };
            let migrator = RefMigrator::new(
                catalog,
                objects,
                RetryPolicy::new(&config.assets),
                config.assets.concurrency,
                options,
            );
            let report = migrator.run().await?;
            println!("Reference migration: {}", report);
            Ok(())
        }
    }
}

/// Dry runs never create or migrate the database.
fn open_catalog(config: &AppConfig) -> Result<Arc<SqliteCatalogStore>> {
    let db_path = config.catalog_db_path();
    if !config.dry_run {
        info!("Opening SQLite catalog database at {:?}...", db_path);
        return Ok(Arc::new(SqliteCatalogStore::new(&db_path)?));
    }
    if db_path.exists() {
        info!("[dry-run] Opening SQLite catalog database at {:?} read-only", db_path);
        Ok(Arc::new(SqliteCatalogStore::open_read_only(&db_path)?))
    } else {
        info!(
            "[dry-run] No catalog database at {:?}, using an empty in-memory catalog",
            db_path
        );
        Ok(Arc::new(SqliteCatalogStore::in_memory()?))
    }
}

async fn run_ingestion(
    config: &AppConfig,
    catalog: Arc<SqliteCatalogStore>,
    objects: Arc<FsObjectStore>,
) -> Result<()> {
    let adapters = build_adapters(config)?;
    let fetcher = Arc::new(HttpAssetFetcher::new(&config.user_agent, config.assets.timeout)?);
    let orchestrator = Orchestrator::from_config(
        config,
        adapters,
        catalog.clone(),
        ProgressStore::new(catalog),
        fetcher,
        objects,
    );

    if config.interval_hours == 0 {
        let summary = orchestrator.run().await?;
        println!("{}", summary);
        return Ok(());
    }

    info!("Running ingestion every {} hour(s)", config.interval_hours);
    let period = Duration::from_secs(config.interval_hours.saturating_mul(60 * 60));
    let mut ticker = tokio::time::interval(period);
    // Iterations never overlap: a slow run delays the next tick
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let summary = orchestrator.run().await?;
        println!("{}", summary);
    }
}
