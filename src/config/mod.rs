//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "latido";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_CACHE_ENTRY_LIMIT: usize = 256;
const DEFAULT_RECONCILE_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_VIEW_DRAIN_INTERVAL_MS: u64 = 1000;
const DEFAULT_VIEW_BATCH_LIMIT: usize = 256;
const DEFAULT_VIEW_QUEUE_CAPACITY: usize = 8192;

/// Command-line arguments for the Latido binary.
#[derive(Debug, Parser)]
#[command(name = "latido", version, about = "Latido blog analytics server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LATIDO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service with the background reconciler.
    Serve(Box<ServeArgs>),
    /// Drain the fast counter store into durable storage once, then exit.
    Reconcile(ReconcileArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the fast counter store Redis URL.
    #[arg(long = "counters-redis-url", value_name = "URL")]
    pub counters_redis_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl LoadError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub counters: CounterSettings,
    pub cache: CacheSettings,
    pub reconciler: ReconcilerSettings,
    pub view_queue: ViewQueueSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CounterSettings {
    /// Redis URL for the fast counter store. Absent means the in-process
    /// fallback store.
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub entry_limit: usize,
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ViewQueueSettings {
    pub drain_interval: Duration,
    pub batch_limit: usize,
    pub capacity: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    counters: RawCounterSettings,
    cache: RawCacheSettings,
    reconciler: RawReconcilerSettings,
    view_queue: RawViewQueueSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCounterSettings {
    redis_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    entry_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReconcilerSettings {
    interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawViewQueueSettings {
    drain_interval_ms: Option<u64>,
    batch_limit: Option<usize>,
    capacity: Option<usize>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.counters_redis_url.as_ref() {
            self.counters.redis_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

/// Parse CLI arguments and load settings with CLI overrides applied.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli_args = CliArgs::parse();
    let settings = load(&cli_args)?;
    Ok((cli_args, settings))
}

pub fn load(cli_args: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli_args.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()));
    }

    let source = builder
        .add_source(Environment::with_prefix("LATIDO").separator("__"))
        .build()?;

    let mut raw: RawSettings = source.try_deserialize()?;

    let overrides = match cli_args.command.as_ref() {
        Some(Command::Serve(args)) => Some(&args.overrides),
        Some(Command::Reconcile(args)) => Some(&args.overrides),
        None => None,
    };
    if let Some(overrides) = overrides {
        raw.apply_overrides(overrides);
    }

    build_settings(raw)
}

fn build_settings(raw: RawSettings) -> Result<Settings, LoadError> {
    Ok(Settings {
        server: build_server_settings(raw.server)?,
        logging: build_logging_settings(raw.logging)?,
        database: build_database_settings(raw.database)?,
        counters: build_counter_settings(raw.counters),
        cache: build_cache_settings(raw.cache),
        reconciler: build_reconciler_settings(raw.reconciler),
        view_queue: build_view_queue_settings(raw.view_queue),
    })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    let addr = format!("{host}:{port}")
        .parse()
        .map_err(|err| LoadError::invalid("server.host", format!("failed to parse: {err}")))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_counter_settings(counters: RawCounterSettings) -> CounterSettings {
    let redis_url = counters.redis_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    CounterSettings { redis_url }
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl_seconds: cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
        entry_limit: cache.entry_limit.unwrap_or(DEFAULT_CACHE_ENTRY_LIMIT),
    }
}

fn build_reconciler_settings(reconciler: RawReconcilerSettings) -> ReconcilerSettings {
    let seconds = reconciler
        .interval_seconds
        .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECONDS)
        .max(1);

    ReconcilerSettings {
        interval: Duration::from_secs(seconds),
    }
}

fn build_view_queue_settings(view_queue: RawViewQueueSettings) -> ViewQueueSettings {
    ViewQueueSettings {
        drain_interval: Duration::from_millis(
            view_queue
                .drain_interval_ms
                .unwrap_or(DEFAULT_VIEW_DRAIN_INTERVAL_MS)
                .max(1),
        ),
        batch_limit: view_queue.batch_limit.unwrap_or(DEFAULT_VIEW_BATCH_LIMIT).max(1),
        capacity: view_queue.capacity.unwrap_or(DEFAULT_VIEW_QUEUE_CAPACITY).max(1),
    }
}
