use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

/// Connection settings for the backing store, read from the environment.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseSettings {
    /// Read settings from the environment (`.env` honored via dotenvy).
    ///
    /// Returns `None` when `DATABASE_URL` is unset, so callers (tests in
    /// particular) can decide whether a missing store is fatal.
    pub fn from_env() -> Option<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok()?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);
        let min_connections = env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Some(Self {
            database_url,
            max_connections,
            min_connections,
            acquire_timeout: Duration::from_secs(3),
        })
    }

    /// Build a connection pool with production-ready settings.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&self.database_url)
            .await
    }
}
