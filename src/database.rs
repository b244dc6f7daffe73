use std::{ops::Deref, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

#[derive(Clone)]
pub struct PostgresConnection(PgPool);

impl PostgresConnection {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    /// Open a connection pool to the catalog database.
    ///
    /// # Arguments
    /// * `database_url` - Connection string for the database.
    /// * `pool_size` - The maximum number of open connections.
    /// * `timeout_seconds` - How long to wait for a free connection before
    ///   failing a query.
    pub async fn connect(
        database_url: &str,
        pool_size: u32,
        timeout_seconds: u8,
    ) -> anyhow::Result<Self> {
        debug!(pool_size, timeout_seconds, "Connecting to catalog database.");

        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds.into()))
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }
}

impl Deref for PostgresConnection {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
