//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::auth::Credential;
use crate::domain::types::{LegacySoftware, Role};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagina";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BLOG_TITLE: &str = "pagina";
const DEFAULT_PUBLIC_SITE_URL: &str = "http://localhost:8080/";
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_FEED_SIZE: u32 = 10;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 512;

/// Command-line arguments for the pagina binary.
#[derive(Debug, Parser)]
#[command(name = "pagina", version, about = "Resource-oriented blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGINA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Print the SHA-256 digest of a bearer token for `auth.credentials`.
    #[command(name = "hash-token")]
    HashToken(HashTokenArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct HashTokenArgs {
    /// The token clients will send as `Authorization: Bearer <TOKEN>`.
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public site URL used in feeds.
    #[arg(long = "blog-public-site-url", value_name = "URL")]
    pub public_site_url: Option<String>,

    /// Toggle the response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the alias file path.
    #[arg(long = "aliases-file", value_name = "PATH")]
    pub aliases_file: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub blog: BlogSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    pub aliases: AliasSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
    /// Without a URL the in-process store is used.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct BlogSettings {
    pub title: String,
    pub description: String,
    pub author: String,
    pub public_site_url: String,
    pub legacy_software: Option<LegacySoftware>,
    pub page_size: NonZeroU32,
    pub feed_size: NonZeroU32,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: NonZeroUsize,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasSettings {
    pub file: Option<PathBuf>,
    pub redirects: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PAGINA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::HashToken(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    blog: RawBlogSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
    aliases: RawAliasSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.public_site_url.as_ref() {
            self.blog.public_site_url = Some(url.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(path) = overrides.aliases_file.as_ref() {
            self.aliases.file = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            blog,
            cache,
            auth,
            aliases,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            blog: build_blog_settings(blog)?,
            cache: build_cache_settings(cache)?,
            auth: build_auth_settings(auth)?,
            aliases: build_alias_settings(aliases),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.host", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_blog_settings(blog: RawBlogSettings) -> Result<BlogSettings, LoadError> {
    let public_site_url = non_blank(blog.public_site_url)
        .unwrap_or_else(|| DEFAULT_PUBLIC_SITE_URL.to_string());
    let parsed = url::Url::parse(&public_site_url)
        .map_err(|err| LoadError::invalid("blog.public_site_url", err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "blog.public_site_url",
            "scheme must be http or https",
        ));
    }

    let legacy_software = non_blank(blog.legacy_blog_software)
        .map(|value| LegacySoftware::from_str(&value))
        .transpose()
        .map_err(|reason| LoadError::invalid("blog.legacy_blog_software", reason))?;

    let title = non_blank(blog.title).unwrap_or_else(|| DEFAULT_BLOG_TITLE.to_string());

    Ok(BlogSettings {
        author: non_blank(blog.author).unwrap_or_else(|| title.clone()),
        title,
        description: blog.description.unwrap_or_default(),
        public_site_url,
        legacy_software,
        page_size: non_zero_u32(
            blog.page_size.unwrap_or(DEFAULT_PAGE_SIZE).into(),
            "blog.page_size",
        )?,
        feed_size: non_zero_u32(
            blog.feed_size.unwrap_or(DEFAULT_FEED_SIZE).into(),
            "blog.feed_size",
        )?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = NonZeroUsize::new(cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES))
        .ok_or_else(|| LoadError::invalid("cache.max_entries", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let credentials = auth
        .credentials
        .into_iter()
        .map(|raw| {
            let name = non_blank(Some(raw.name))
                .ok_or_else(|| LoadError::invalid("auth.credentials", "name must not be empty"))?;
            let role = Role::from_str(&raw.role)
                .map_err(|reason| LoadError::invalid("auth.credentials", format!("{name}: {reason}")))?;
            Credential::new(name.clone(), non_blank(raw.email), role, &raw.token_sha256).map_err(
                |err| {
                    LoadError::invalid(
                        "auth.credentials",
                        format!("{name}: token_sha256 must be 64 hex characters ({err})"),
                    )
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AuthSettings { credentials })
}

fn build_alias_settings(aliases: RawAliasSettings) -> AliasSettings {
    AliasSettings {
        file: aliases.file.filter(|path| !path.as_os_str().is_empty()),
        redirects: aliases.redirects,
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    public_site_url: Option<String>,
    legacy_blog_software: Option<String>,
    page_size: Option<u32>,
    feed_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    credentials: Vec<RawCredential>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCredential {
    name: String,
    #[serde(default)]
    email: Option<String>,
    role: String,
    token_sha256: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAliasSettings {
    file: Option<PathBuf>,
    redirects: BTreeMap<String, String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
