use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use crate::error::{ServerError, ServerResult};

/// Connection settings for the PostgreSQL backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 54320,
            user: "username".into(),
            password: "password".into(),
            name: "appdatabase".into(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

/// Service configuration.
///
/// Layered as defaults, then an optional TOML file, then environment
/// variables. Empty environment values are treated as unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: IpAddr,
    pub http_port: u16,
    pub base_uri: String,
    /// Log file; `None` logs to stdout.
    pub log_path: Option<PathBuf>,
    pub ledger_timeout_ms: u64,
    pub database: DatabaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8000,
            base_uri: "/api".into(),
            log_path: None,
            ledger_timeout_ms: 5_000,
            database: DatabaseConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Override fields from variables returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = var("DB_PORT") {
            self.database.port = parse_var("DB_PORT", &v)?;
        }
        if let Some(v) = var("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = var("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = var("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = var("DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = var("BASE_URI") {
            self.base_uri = v;
        }
        if let Some(v) = var("HTTP_PORT") {
            self.http_port = parse_var("HTTP_PORT", &v)?;
        }
        if let Some(v) = var("LOG_PATH") {
            self.log_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("LEDGER_TIMEOUT_MS") {
            self.ledger_timeout_ms = parse_var("LEDGER_TIMEOUT_MS", &v)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.database.max_connections == 0 {
            return Err(ServerError::Config("DB_MAX_CONNECTIONS must be at least 1".into()));
        }
        if self.ledger_timeout_ms == 0 {
            return Err(ServerError::Config("LEDGER_TIMEOUT_MS must be at least 1".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.http_port)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    /// Base URI with a leading slash and no trailing slash; `""` mounts at root.
    pub fn normalized_base_uri(&self) -> String {
        normalize_base_uri(&self.base_uri)
    }

    /// Copy safe to print: the database password is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.database.password = "********".into();
        copy
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Internal(e.to_string()))
    }
}

pub fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> ServerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{name}: invalid value {value:?}")))
}
