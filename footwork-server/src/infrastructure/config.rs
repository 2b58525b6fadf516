use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Seconds between reconciliation runs of the scheduled publisher.
    pub publish_interval_secs: u64,
    /// Upper bound on the publisher's discovery query.
    pub publish_discovery_timeout_secs: u64,
    pub rate_limit_max_requests: i32,
    pub rate_limit_window_ms: i64,
    pub rate_limit_cleanup_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let publish_interval_secs = env_parse("PUBLISH_INTERVAL_SECS", 60)?;
        let publish_discovery_timeout_secs = env_parse("PUBLISH_DISCOVERY_TIMEOUT_SECS", 30)?;
        let rate_limit_max_requests = env_parse("RATE_LIMIT_MAX_REQUESTS", 60)?;
        let rate_limit_window_ms = env_parse("RATE_LIMIT_WINDOW_MS", 60_000)?;
        let rate_limit_cleanup_interval_secs = env_parse("RATE_LIMIT_CLEANUP_INTERVAL_SECS", 300)?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            cors_origins,
            publish_interval_secs,
            publish_discovery_timeout_secs,
            rate_limit_max_requests,
            rate_limit_window_ms,
            rate_limit_cleanup_interval_secs,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
