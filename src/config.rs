//! Process-wide configuration, read once at startup.
//!
//! Both binaries call [`AppConfig::from_env`] after loading `.env` and then
//! hand the pieces they need to each component. Nothing below re-reads the
//! environment per call.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_HUBSPOT_API_BASE_URL: &str = "https://api.hubapi.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("could not build database url: {0}")]
    DatabaseUrl(String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub hubspot: HubSpotConfig,
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    /// Fully assembled Postgres URL (credentials included).
    pub url: String,
    pub connect_timeout: Duration,
}

#[derive(Clone)]
pub struct HubSpotConfig {
    /// `None` when `HUBSPOT_ACCESS_TOKEN` is unset or blank.
    pub access_token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    /// Opaque cursor to resume from; absent means "start at the first page".
    pub checkpoint_after: Option<String>,
    pub startup_delay: Duration,
}

impl AppConfig {
    /// Reads the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseConfig {
            url: match get("DATABASE_URL") {
                Some(url) => url,
                None => postgres_url(
                    &get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                    parse_or("DB_PORT", get("DB_PORT"), 5432u16)?,
                    &get("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                    &get("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                    get("DB_PASSWORD").as_deref(),
                )?,
            },
            connect_timeout: Duration::from_secs(parse_or(
                "DB_CONNECT_TIMEOUT_SECS",
                get("DB_CONNECT_TIMEOUT_SECS"),
                5u64,
            )?),
        };

        let hubspot = HubSpotConfig {
            access_token: get("HUBSPOT_ACCESS_TOKEN").map(|t| t.trim().to_string()),
            base_url: get("HUBSPOT_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_HUBSPOT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(parse_or(
                "HUBSPOT_TIMEOUT_SECS",
                get("HUBSPOT_TIMEOUT_SECS"),
                15u64,
            )?),
        };

        let server = ServerConfig {
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 8000)),
            )?,
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
        };

        let extraction = ExtractionConfig {
            checkpoint_after: get("HUBSPOT_CHECKPOINT_AFTER"),
            startup_delay: Duration::from_secs(parse_or(
                "EXTRACTION_STARTUP_DELAY_SECS",
                get("EXTRACTION_STARTUP_DELAY_SECS"),
                10u64,
            )?),
        };

        Ok(Self {
            database,
            hubspot,
            server,
            extraction,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

fn postgres_url(
    host: &str,
    port: u16,
    name: &str,
    user: &str,
    password: Option<&str>,
) -> Result<String, ConfigError> {
    let mut url = Url::parse("postgres://localhost")
        .map_err(|e| ConfigError::DatabaseUrl(e.to_string()))?;
    url.set_host(Some(host))
        .map_err(|e| ConfigError::DatabaseUrl(format!("host {:?}: {}", host, e)))?;
    url.set_port(Some(port))
        .map_err(|_| ConfigError::DatabaseUrl(format!("port {}", port)))?;
    url.set_username(user)
        .map_err(|_| ConfigError::DatabaseUrl(format!("user {:?}", user)))?;
    if let Some(password) = password {
        url.set_password(Some(password))
            .map_err(|_| ConfigError::DatabaseUrl("password".to_string()))?;
    }
    url.set_path(name);
    Ok(url.to_string())
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = match Url::parse(&self.url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparseable>".to_string(),
        };
        f.debug_struct("DatabaseConfig")
            .field("url", &redacted)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl fmt::Debug for HubSpotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubSpotConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
