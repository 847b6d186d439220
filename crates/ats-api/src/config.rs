//! Server configuration, read once from the environment at startup.
//!
//! Environment variables:
//!   DATABASE_URL           - PostgreSQL connection string
//!   HOST / PORT            - bind address (default 0.0.0.0:3010)
//!   ALLOWED_ORIGINS        - comma-separated CORS allow-list
//!   FRONTEND_URL           - single origin used when ALLOWED_ORIGINS is unset
//!   RATE_LIMIT_ENABLED     - "true"/"false" (default true)
//!   RATE_LIMIT_REQUESTS    - requests per period (default 100)
//!   RATE_LIMIT_PERIOD_SECS - period length in seconds (default 60)
//!   MAX_BODY_BYTES         - request body cap (default 10 MiB)
//!   DB_MAX_CONNECTIONS     - pool ceiling (default 10)
//!   DB_MIN_CONNECTIONS     - connections kept warm (default 1)
//!   DB_ACQUIRE_TIMEOUT_SECS - wait for a free connection (default 30)
//!   DB_IDLE_TIMEOUT_SECS   - close idle connections after this; 0 = never (default 600)
//!   DB_MAX_LIFETIME_SECS   - recycle connections after this; 0 = never (default 1800)
//!   RUN_MIGRATIONS         - apply migrations on startup (default true)

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use tracing::warn;

use ats_db::PoolConfig;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ats";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3010;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Request budget granted to each client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u32,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: DEFAULT_RATE_LIMIT_REQUESTS,
            period_secs: DEFAULT_RATE_LIMIT_PERIOD_SECS,
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<HeaderValue>,
    pub rate_limit: RateLimitConfig,
    pub max_body_bytes: usize,
    pub pool: PoolConfig,
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)],
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pool: PoolConfig::default(),
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let origins_source = lookup("ALLOWED_ORIGINS")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup("FRONTEND_URL").filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_string());
        let mut allowed_origins = parse_allowed_origins(&origins_source);
        if allowed_origins.is_empty() {
            warn!(
                subsystem = "config",
                op = "cors",
                "No valid CORS origins configured, using {}",
                DEFAULT_ALLOWED_ORIGIN
            );
            allowed_origins = defaults.allowed_origins.clone();
        }

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            allowed_origins,
            rate_limit: RateLimitConfig {
                enabled: parse_bool_or(lookup("RATE_LIMIT_ENABLED"), defaults.rate_limit.enabled),
                requests: parse_or(
                    "RATE_LIMIT_REQUESTS",
                    lookup("RATE_LIMIT_REQUESTS"),
                    defaults.rate_limit.requests,
                ),
                period_secs: parse_or(
                    "RATE_LIMIT_PERIOD_SECS",
                    lookup("RATE_LIMIT_PERIOD_SECS"),
                    defaults.rate_limit.period_secs,
                ),
            },
            max_body_bytes: parse_or(
                "MAX_BODY_BYTES",
                lookup("MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            ),
            pool: pool_from_lookup(&lookup, defaults.pool),
            run_migrations: parse_bool_or(lookup("RUN_MIGRATIONS"), defaults.run_migrations),
        }
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(subsystem = "config", key, value = %raw, "Invalid value, using default");
                default
            }
        },
    }
}

fn pool_from_lookup<F>(lookup: &F, defaults: PoolConfig) -> PoolConfig
where
    F: Fn(&str) -> Option<String>,
{
    let secs = |key: &str, default: Duration| {
        Duration::from_secs(parse_or(key, lookup(key), default.as_secs()))
    };
    // Zero disables the limit.
    let optional_secs = |key: &str, default: Option<Duration>| {
        let n = parse_or(key, lookup(key), default.map_or(0, |d| d.as_secs()));
        (n > 0).then(|| Duration::from_secs(n))
    };

    PoolConfig {
        max_connections: parse_or(
            "DB_MAX_CONNECTIONS",
            lookup("DB_MAX_CONNECTIONS"),
            defaults.max_connections,
        ),
        min_connections: parse_or(
            "DB_MIN_CONNECTIONS",
            lookup("DB_MIN_CONNECTIONS"),
            defaults.min_connections,
        ),
        acquire_timeout: secs("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout),
        idle_timeout: optional_secs("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
        max_lifetime: optional_secs("DB_MAX_LIFETIME_SECS", defaults.max_lifetime),
    }
}

fn parse_bool_or(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

/// Parse a comma-separated CORS origin list.
///
/// Entries must be `http://` or `https://` origins; anything else is logged
/// and skipped. Wildcards are never accepted.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                return None;
            }
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                warn!("Invalid CORS origin '{}': not an http(s) origin", trimmed);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3010);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.allowed_origins, vec![HeaderValue::from_static("http://localhost:3000")]);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.pool, PoolConfig::default());
        assert!(config.run_migrations);
    }

    #[test]
    fn test_pool_settings() {
        let config = config_from(&[
            ("DB_MAX_CONNECTIONS", "25"),
            ("DB_MIN_CONNECTIONS", "5"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "3"),
            ("DB_IDLE_TIMEOUT_SECS", "0"),
            ("DB_MAX_LIFETIME_SECS", "120"),
        ]);
        assert_eq!(config.pool.max_connections, 25);
        assert_eq!(config.pool.min_connections, 5);
        assert_eq!(config.pool.acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.pool.idle_timeout, None);
        assert_eq!(config.pool.max_lifetime, Some(Duration::from_secs(120)));

        let config = config_from(&[("DB_ACQUIRE_TIMEOUT_SECS", "soon")]);
        assert_eq!(config.pool.acquire_timeout, PoolConfig::default().acquire_timeout);
    }

    #[test]
    fn test_frontend_url_used_when_allowed_origins_missing() {
        let config = config_from(&[("FRONTEND_URL", "https://ats.example.com")]);
        assert_eq!(config.allowed_origins.len(), 1);
        assert_eq!(config.allowed_origins[0], "https://ats.example.com");

        let config = config_from(&[
            ("FRONTEND_URL", "https://ats.example.com"),
            ("ALLOWED_ORIGINS", "https://a.com,https://b.com"),
        ]);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("PORT", "eighty"), ("RATE_LIMIT_REQUESTS", "-1")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.rate_limit.requests, DEFAULT_RATE_LIMIT_REQUESTS);
    }

    #[test]
    fn test_boolean_flags() {
        let config = config_from(&[("RATE_LIMIT_ENABLED", "false"), ("RUN_MIGRATIONS", "0")]);
        assert!(!config.rate_limit.enabled);
        assert!(!config.run_migrations);

        let config = config_from(&[("RATE_LIMIT_ENABLED", "maybe")]);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_parse_allowed_origins() {
        let origins = parse_allowed_origins("https://a.com, http://localhost:3000/ ,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1], "http://localhost:3000");

        assert!(parse_allowed_origins("*").is_empty());
        assert_eq!(parse_allowed_origins("not-a-url,https://ok.com").len(), 1);
    }

    #[test]
    fn test_only_invalid_origins_use_default() {
        let config = config_from(&[("ALLOWED_ORIGINS", "*")]);
        assert_eq!(config.allowed_origins, vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)]);
    }

    #[test]
    fn test_socket_addr() {
        let config = config_from(&[("HOST", "127.0.0.1"), ("PORT", "8080")]);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }
}
