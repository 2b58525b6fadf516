use crate::domain::error::DomainError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

/// One fixed-window counter per `(ip, endpoint)` pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RateLimitRecord {
    pub ip: String,
    pub endpoint: String,
    pub requests: i32,
    pub window_start: DateTime<Utc>,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn find(&self, ip: &str, endpoint: &str)
        -> Result<Option<RateLimitRecord>, DomainError>;
    /// Create the record for a fresh window with `requests = 1`. Upserts, so
    /// a concurrent first request simply restarts the window.
    async fn start_window(
        &self,
        ip: &str,
        endpoint: &str,
        window_start: DateTime<Utc>,
    ) -> Result<(), DomainError>;
    async fn increment(&self, ip: &str, endpoint: &str) -> Result<(), DomainError>;
    /// Delete every record whose window started before `cutoff`. Returns the
    /// number of rows removed.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}

#[derive(Clone)]
pub struct PostgresRateLimitStore {
    pool: PgPool,
}

impl PostgresRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PostgresRateLimitStore {
    async fn find(
        &self,
        ip: &str,
        endpoint: &str,
    ) -> Result<Option<RateLimitRecord>, DomainError> {
        sqlx::query_as::<_, RateLimitRecord>(
            "SELECT ip, endpoint, requests, window_start FROM rate_limits WHERE ip = $1 AND endpoint = $2",
        )
        .bind(ip)
        .bind(endpoint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Internal(e.to_string()))
    }

    async fn start_window(
        &self,
        ip: &str,
        endpoint: &str,
        window_start: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO rate_limits (ip, endpoint, requests, window_start)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (ip, endpoint)
            DO UPDATE SET requests = 1, window_start = EXCLUDED.window_start
            "#,
        )
        .bind(ip)
        .bind(endpoint)
        .bind(window_start)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn increment(&self, ip: &str, endpoint: &str) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE rate_limits SET requests = requests + 1 WHERE ip = $1 AND endpoint = $2",
        )
        .bind(ip)
        .bind(endpoint)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE window_start < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while cleaning up rate limit records: {}", e);
                DomainError::Internal(e.to_string())
            })?;
        Ok(result.rows_affected())
    }
}
