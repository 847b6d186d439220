//! Shared application state handed to every handler.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use ats_core::CandidateService;

use crate::config::RateLimitConfig;

/// Rate limiter with one bucket per client address.
pub type ClientRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

#[derive(Clone)]
pub struct AppState {
    pub service: CandidateService,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<ClientRateLimiter>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: CandidateService, rate_limit: &RateLimitConfig) -> Self {
        Self {
            service,
            rate_limiter: build_rate_limiter(rate_limit).map(Arc::new),
            started_at: Instant::now(),
        }
    }
}

/// Build a limiter allowing each client `requests` per `period_secs`,
/// refilled evenly.
///
/// Returns `None` when disabled or when either value is zero.
pub fn build_rate_limiter(config: &RateLimitConfig) -> Option<ClientRateLimiter> {
    if !config.enabled {
        return None;
    }
    let Some(burst) = NonZeroU32::new(config.requests) else {
        warn!(
            subsystem = "api",
            op = "rate_limit",
            "RATE_LIMIT_REQUESTS is zero, rate limiting disabled"
        );
        return None;
    };
    let Some(quota) = Quota::with_period(Duration::from_secs(config.period_secs) / burst.get())
    else {
        warn!(
            subsystem = "api",
            op = "rate_limit",
            "RATE_LIMIT_PERIOD_SECS is zero, rate limiting disabled"
        );
        return None;
    };
    Some(RateLimiter::keyed(quota.allow_burst(burst)))
}

/// Periodically drop buckets of clients that are back at full budget.
pub fn spawn_limiter_sweeper(
    limiter: Arc<ClientRateLimiter>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
            tracing::debug!(
                subsystem = "api",
                op = "rate_limit",
                tracked_clients = limiter.len(),
                "Rate limiter buckets swept"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn client(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_disabled_limiter() {
        assert!(build_rate_limiter(&RateLimitConfig::disabled()).is_none());
    }

    #[test]
    fn test_zero_values_disable_limiter() {
        let zero_requests = RateLimitConfig {
            enabled: true,
            requests: 0,
            period_secs: 60,
        };
        assert!(build_rate_limiter(&zero_requests).is_none());

        let zero_period = RateLimitConfig {
            enabled: true,
            requests: 10,
            period_secs: 0,
        };
        assert!(build_rate_limiter(&zero_period).is_none());
    }

    #[test]
    fn test_limiter_allows_burst_then_rejects() {
        let limiter = build_rate_limiter(&RateLimitConfig {
            enabled: true,
            requests: 3,
            period_secs: 3600,
        })
        .unwrap();
        for _ in 0..3 {
            assert!(limiter.check_key(&client(1)).is_ok());
        }
        assert!(limiter.check_key(&client(1)).is_err());
    }

    #[test]
    fn test_clients_have_separate_budgets() {
        let limiter = build_rate_limiter(&RateLimitConfig {
            enabled: true,
            requests: 1,
            period_secs: 3600,
        })
        .unwrap();
        assert!(limiter.check_key(&client(1)).is_ok());
        assert!(limiter.check_key(&client(1)).is_err());
        assert!(limiter.check_key(&client(2)).is_ok());
        assert_eq!(limiter.len(), 2);
    }
}
