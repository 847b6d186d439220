//! Connection pool settings for the candidate store.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use ats_core::{Error, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Sizing and timeouts for the candidate store pool.
///
/// `None` for the idle timeout or the lifetime means connections are never
/// retired for that reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Connections kept open while the service is idle.
    pub min_connections: u32,
    /// How long a request waits for a free connection before failing.
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_lifetime: Some(DEFAULT_MAX_LIFETIME),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Repair settings sqlx would reject: the pool holds at least one
    /// connection and the warm floor never exceeds the ceiling.
    pub fn normalized(mut self) -> Self {
        if self.max_connections == 0 {
            warn!(
                subsystem = "database",
                component = "pool",
                "max_connections is zero, using 1"
            );
            self.max_connections = 1;
        }
        if self.min_connections > self.max_connections {
            warn!(
                subsystem = "database",
                component = "pool",
                min_connections = self.min_connections,
                max_connections = self.max_connections,
                "min_connections above max_connections, clamping"
            );
            self.min_connections = self.max_connections;
        }
        self
    }

    /// sqlx pool options for these settings, after [`normalized`](Self::normalized).
    pub fn to_options(&self) -> PgPoolOptions {
        let config = self.clone().normalized();
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
    }
}

/// Open a pool with the default settings.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Open a pool and wait for the first connection.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let options = config.to_options();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = options.get_max_connections(),
        min_connections = options.get_min_connections(),
        acquire_timeout_secs = options.get_acquire_timeout().as_secs(),
        idle_timeout_secs = options.get_idle_timeout().map(|d| d.as_secs()),
        max_lifetime_secs = options.get_max_lifetime().map(|d| d.as_secs()),
        "Opening candidate store pool"
    );

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Candidate store pool ready"
    );
    Ok(pool)
}
