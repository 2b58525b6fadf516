use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::data::rate_limit_repository::RateLimitStore;
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: i32,
    pub window_ms: i64,
}

impl RateLimitConfig {
    fn window(&self) -> Duration {
        Duration::milliseconds(self.window_ms)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitDecision {
    pub limited: bool,
    pub remaining: i32,
    pub reset_time: DateTime<Utc>,
}

/// Best-effort fixed-window throttle backed by the database. Advisory only:
/// every store error resolves to "allow", and concurrent writers may push
/// the true count slightly past the max. `check` itself is infallible.
#[derive(Clone)]
pub struct RateLimiter<S: RateLimitStore + 'static> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl<S> RateLimiter<S>
where
    S: RateLimitStore + 'static,
{
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub async fn check(&self, ip: &str, endpoint: &str) -> LimitDecision {
        let now = Utc::now();
        match self.try_check(ip, endpoint, now).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(ip, endpoint, error = %e, "rate limit check failed, allowing request");
                self.open_decision(now)
            }
        }
    }

    async fn try_check(
        &self,
        ip: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> Result<LimitDecision, DomainError> {
        let window = self.config.window();

        let record = match self.store.find(ip, endpoint).await? {
            Some(record) if record.window_start + window > now => record,
            _ => {
                // First request of a window, or the old window has elapsed.
                self.store.start_window(ip, endpoint, now).await?;
                return Ok(LimitDecision {
                    limited: false,
                    remaining: self.config.max_requests.saturating_sub(1),
                    reset_time: now + window,
                });
            }
        };

        let reset_time = record.window_start + window;
        if record.requests >= self.config.max_requests {
            debug!(ip, endpoint, requests = record.requests, "request rate limited");
            return Ok(LimitDecision {
                limited: true,
                remaining: 0,
                reset_time,
            });
        }

        self.store.increment(ip, endpoint).await?;
        Ok(LimitDecision {
            limited: false,
            remaining: self.config.max_requests - record.requests - 1,
            reset_time,
        })
    }

    /// Maintenance: drop records whose window has fully elapsed. Failures
    /// are logged and swallowed, same as the request path.
    pub async fn cleanup_expired(&self) -> u64 {
        let cutoff = Utc::now() - self.config.window();
        match self.store.delete_expired(cutoff).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "rate limit cleanup failed");
                0
            }
        }
    }

    fn open_decision(&self, now: DateTime<Utc>) -> LimitDecision {
        LimitDecision {
            limited: false,
            remaining: self.config.max_requests,
            reset_time: now + self.config.window(),
        }
    }
}
