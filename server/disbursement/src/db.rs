use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::errors::StoreResult;

/// Owned connection pool. Opened by the process entry point, passed to the
/// stores by clone, closed on shutdown.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("disbursement schema up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
