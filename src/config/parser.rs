use super::ConfigError;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(alias = "console", default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            transient_retries: default_transient_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ResolverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: Option<DbType>,
    #[serde(default, alias = "conn_string")]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_max_connections", alias = "pool_size")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: None,
            url: None,
            filename: None,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            max_connections: default_max_connections(),
            min_connections: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn sqlite<P: Into<String>>(path: P) -> Self {
        Self {
            backend: Some(DbType::Sqlite),
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_url<U: Into<String>>(url: U) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Backend named by the URL scheme, falling back to SQLite for anything
    /// that is not a recognised client-server scheme.
    pub fn detected_db_type(&self) -> DbType {
        match self.url.as_deref() {
            Some(url) if url.starts_with("mysql://") => DbType::Mysql,
            Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
                DbType::Postgres
            }
            Some(_) | None => DbType::Sqlite,
        }
    }

    pub fn db_type(&self) -> DbType {
        self.backend.unwrap_or_else(|| self.detected_db_type())
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if self.db_type() != DbType::Sqlite {
            return None;
        }
        if let Some(ref file) = self.filename {
            return Some(file.clone());
        }
        self.url.as_ref().map(|url| {
            url.strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(url)
                .to_string()
        })
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn min_connections(&self) -> u32 {
        self.min_connections.unwrap_or(1).min(self.max_connections)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[serde(alias = "embedded", alias = "sqlite3")]
    Sqlite,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
}

impl DbType {
    pub fn default_port(self) -> Option<u16> {
        match self {
            DbType::Sqlite => None,
            DbType::Postgres => Some(5432),
            DbType::Mysql => Some(3306),
        }
    }

    /// Whether the driver for this engine is part of the build.
    pub fn is_compiled_in(self) -> bool {
        match self {
            DbType::Sqlite => cfg!(feature = "sqlite"),
            DbType::Postgres => cfg!(feature = "postgres"),
            DbType::Mysql => cfg!(feature = "mysql"),
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            DbType::Sqlite => "sqlite",
            DbType::Postgres => "postgres",
            DbType::Mysql => "mysql",
        }
    }
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DbType::Sqlite => "SQLite",
            DbType::Postgres => "PostgreSQL",
            DbType::Mysql => "MySQL",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for DbType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "embedded" => Ok(DbType::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(DbType::Postgres),
            "mysql" | "mariadb" => Ok(DbType::Mysql),
            other => Err(ConfigError::InvalidConfig(format!(
                "unknown database backend '{other}'"
            ))),
        }
    }
}

impl Config {
    /// Loads the configuration once at startup.
    ///
    /// An explicitly requested file must exist. Without one, `config.yaml` is
    /// read when present and the defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::parse_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path.as_ref())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("IDENTITY_DATABASE_BACKEND") {
            self.database.backend = Some(value.parse()?);
        }
        if let Some(value) = lookup("IDENTITY_DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Some(value) = lookup("IDENTITY_DATABASE_PASSWORD") {
            self.database.password = Some(SecretString::from(value));
        }
        if let Some(value) = lookup("IDENTITY_POOL_SIZE") {
            self.database.max_connections = parse_env("IDENTITY_POOL_SIZE", &value)?;
        }
        if let Some(value) = lookup("IDENTITY_LOOKUP_TIMEOUT_MS") {
            self.database.lookup_timeout_ms = parse_env("IDENTITY_LOOKUP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("IDENTITY_LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn default_port() -> u16 {
    7070
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_connections() -> u32 {
    3
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

fn default_transient_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    50
}
