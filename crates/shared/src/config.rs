//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Locations of migration and seed files.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
///
/// Either `url` is set, or the URL is assembled from the individual parts.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the individual parts.
    #[serde(default)]
    pub url: Option<String>,
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Database password.
    #[serde(default)]
    pub password: String,
    /// Database name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Postgres `sslmode` parameter.
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_name() -> String {
    "postgres".to_string()
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            name: default_name(),
            ssl_mode: default_ssl_mode(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Returns the connection URL.
    ///
    /// The explicit `url` wins. Otherwise a `postgres://` URL is built from the
    /// parts, with user and password percent-encoded.
    pub fn connection_url(&self) -> Result<String, config::ConfigError> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }

        let invalid = |what: &str| config::ConfigError::Message(format!("invalid database {what}"));

        let mut url = Url::parse("postgres://localhost")
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        url.set_host(Some(&self.host)).map_err(|_| invalid("host"))?;
        url.set_port(Some(self.port)).map_err(|()| invalid("port"))?;
        url.set_username(&self.user).map_err(|()| invalid("user"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|()| invalid("password"))?;
        }
        url.set_path(&self.name);
        url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);

        Ok(url.into())
    }
}

/// Locations of the SQL sources.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `<version>_<description>.sql` migration files.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// Directory holding seed `.sql` files.
    #[serde(default = "default_seeds_dir")]
    pub seeds_dir: PathBuf,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_seeds_dir() -> PathBuf {
    PathBuf::from("seeds")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            migrations_dir: default_migrations_dir(),
            seeds_dir: default_seeds_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, lowest precedence first: `config/default`, `config/{RUN_MODE}`,
    /// then `SPROUT__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SPROUT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
