//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use tracing::warn;

use spots_db::PoolConfig;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/spots";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Global request quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub period: Duration,
}

/// Everything the binary needs to start serving.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Path prefix the spots routes are nested under. Empty means the root.
    pub api_prefix: String,
    pub pool: PoolConfig,
    pub run_migrations: bool,
    pub allowed_origins: Vec<HeaderValue>,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            pool: PoolConfig::default(),
            run_migrations: true,
            allowed_origins: parse_allowed_origins(DEFAULT_ALLOWED_ORIGINS),
            rate_limit: Some(RateLimitConfig {
                requests: DEFAULT_RATE_LIMIT_REQUESTS,
                period: Duration::from_secs(DEFAULT_RATE_LIMIT_PERIOD_SECS),
            }),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset variables take their defaults; unparsable values are logged and
    /// replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let rate_limit_enabled = lookup("RATE_LIMIT_ENABLED")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);
        let rate_limit = rate_limit_enabled.then(|| RateLimitConfig {
            requests: parse_or(
                &lookup,
                "RATE_LIMIT_REQUESTS",
                DEFAULT_RATE_LIMIT_REQUESTS,
            )
            .max(1),
            period: Duration::from_secs(
                parse_or(
                    &lookup,
                    "RATE_LIMIT_PERIOD_SECS",
                    DEFAULT_RATE_LIMIT_PERIOD_SECS,
                )
                .max(1),
            ),
        });

        let mut pool = defaults.pool.clone();
        pool.max_connections =
            parse_or(&lookup, "DB_MAX_CONNECTIONS", pool.max_connections).max(1);
        pool.connect_timeout = Duration::from_secs(parse_or(
            &lookup,
            "DB_CONNECT_TIMEOUT_SECS",
            pool.connect_timeout.as_secs(),
        ));

        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(raw) if !raw.trim().is_empty() => parse_allowed_origins(&raw),
            _ => defaults.allowed_origins.clone(),
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            api_prefix: lookup("API_PREFIX")
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.api_prefix),
            pool,
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            allowed_origins,
            rate_limit,
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
        }
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, "Ignoring unparsable value, using default");
            default
        }),
        None => default,
    }
}

/// `"api/"` becomes `"/api"`; `"/"` and `""` mean no prefix.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Parse a comma-separated origin list, skipping entries that are not valid
/// header values.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
