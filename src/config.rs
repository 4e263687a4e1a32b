use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use http::Method;

/// The default name of the cookie carrying the session token.
pub const DEFAULT_COOKIE_NAME: &str = "_lear_session_";
/// The default lifetime of the session token cookie in days.
pub const DEFAULT_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// The default header carrying the identified user id.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";

const SECONDS_PER_DAY: i64 = 86_400;

/// The persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "redis" => Ok(StoreBackend::Redis),
            other => anyhow::bail!("Unknown STORE_BACKEND '{}' (expected postgres or redis)", other),
        }
    }
}

/// Settings consumed by every tracking operation.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// The name of the cookie carrying the session token.
    pub cookie_name: String,
    /// HTTP methods that produce a "request" event.
    pub trackable_methods: Vec<Method>,
    /// Whether requests from crawlers are tracked.
    pub track_bots: bool,
    /// The max age of the session token cookie in seconds.
    pub cookie_max_age_secs: i64,
    /// Whether the session cookie is marked `Secure`.
    pub secure_cookie: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            trackable_methods: vec![Method::GET],
            track_bots: false,
            cookie_max_age_secs: DEFAULT_COOKIE_MAX_AGE_DAYS * SECONDS_PER_DAY,
            secure_cookie: false,
        }
    }
}

impl TrackingConfig {
    /// Creates a new `TrackingConfig` from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let trackable_methods = match env::var("LEAR_TRACKABLE_METHODS") {
            Ok(raw) => parse_methods(&raw)?,
            Err(_) => defaults.trackable_methods,
        };

        Ok(Self {
            cookie_name: env::var("LEAR_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            trackable_methods,
            track_bots: env::var("LEAR_TRACK_BOTS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid LEAR_TRACK_BOTS (expected true or false)")?,
            cookie_max_age_secs: cookie_max_age_secs(
                env::var("LEAR_COOKIE_MAX_AGE_DAYS")
                    .unwrap_or_else(|_| DEFAULT_COOKIE_MAX_AGE_DAYS.to_string())
                    .trim()
                    .parse()
                    .context("Invalid LEAR_COOKIE_MAX_AGE_DAYS")?,
            )?,
            secure_cookie: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
        })
    }

    /// Returns whether requests with `method` produce a "request" event.
    pub fn is_trackable(&self, method: &Method) -> bool {
        self.trackable_methods.iter().any(|m| m == method)
    }
}

/// Converts a cookie lifetime in days to seconds.
///
/// The lifetime must be positive and fit in an `i64` number of seconds.
pub fn cookie_max_age_secs(days: i64) -> Result<i64> {
    if days <= 0 {
        anyhow::bail!("LEAR_COOKIE_MAX_AGE_DAYS must be positive, got {}", days);
    }
    days.checked_mul(SECONDS_PER_DAY)
        .with_context(|| format!("LEAR_COOKIE_MAX_AGE_DAYS is too large: {}", days))
}

/// Resolves `LEAR_IDENTITY_HEADER`: unset falls back to `x-user-id`, an empty
/// value disables identification.
pub fn identity_header(raw: Option<String>) -> Option<String> {
    match raw {
        None => Some(DEFAULT_IDENTITY_HEADER.to_string()),
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => Some(raw.trim().to_string()),
    }
}

/// Parses a comma-separated list of HTTP methods such as `GET,POST`.
pub fn parse_methods(raw: &str) -> Result<Vec<Method>> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method '{}' in LEAR_TRACKABLE_METHODS", m))
        })
        .collect()
}

/// The application's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The selected store backend.
    pub store_backend: StoreBackend,
    /// The URL of the PostgreSQL database, required for the postgres backend.
    pub database_url: Option<String>,
    /// The URL of the Redis server, required for the redis backend.
    pub redis_url: Option<String>,
    /// The address the server binds to.
    pub bind_addr: SocketAddr,
    /// The header the user id is read from, or `None` to keep every session
    /// anonymous. The header must be set by a trusted upstream auth layer
    /// that drops any client-supplied copy.
    pub identity_header: Option<String>,
    /// Tracking settings.
    pub tracking: TrackingConfig,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// Fails when the URL for the selected store backend is missing, so the
    /// server never starts without a store.
    pub fn from_env() -> Result<Self> {
        let store_backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        let redis_url = env::var("REDIS_URL").ok();

        match store_backend {
            StoreBackend::Postgres if database_url.is_none() => {
                anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres")
            }
            StoreBackend::Redis if redis_url.is_none() => {
                anyhow::bail!("REDIS_URL must be set when STORE_BACKEND=redis")
            }
            _ => {}
        }

        Ok(Self {
            store_backend,
            database_url,
            redis_url,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            identity_header: identity_header(env::var("LEAR_IDENTITY_HEADER").ok()),
            tracking: TrackingConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tracks_get_only() {
        let config = TrackingConfig::default();
        assert_eq!(config.cookie_name, "_lear_session_");
        assert!(config.is_trackable(&Method::GET));
        assert!(!config.is_trackable(&Method::POST));
        assert!(!config.track_bots);
        assert_eq!(config.cookie_max_age_secs, 31_536_000);
        assert!(!config.secure_cookie);
    }

    #[test]
    fn cookie_max_age_must_be_positive_and_fit() {
        assert_eq!(cookie_max_age_secs(1).unwrap(), 86_400);
        assert!(cookie_max_age_secs(0).is_err());
        assert!(cookie_max_age_secs(-7).is_err());
        assert!(cookie_max_age_secs(i64::MAX / 1000).is_err());
    }

    #[test]
    fn parses_method_lists() {
        let methods = parse_methods("get, POST,,head").unwrap();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::HEAD]);
    }

    #[test]
    fn rejects_garbage_methods() {
        assert!(parse_methods("GE T").is_err());
    }

    #[test]
    fn empty_identity_header_disables_identification() {
        assert_eq!(identity_header(None).as_deref(), Some("x-user-id"));
        assert_eq!(identity_header(Some(" x-auth-user ".to_string())).as_deref(), Some("x-auth-user"));
        assert_eq!(identity_header(Some("".to_string())), None);
    }

    #[test]
    fn parses_store_backend() {
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!("redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert!("mysql".parse::<StoreBackend>().is_err());
    }
}
