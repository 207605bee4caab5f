use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;

/// Reference-catalog lookup consumed by the indicator orchestrator. A trait
/// so the orchestrator can be exercised without a database.
#[async_trait]
pub trait TickerCatalog: Send + Sync {
    async fn ticker_exists(&self, ticker: &str) -> Result<bool, AppError>;
}

pub struct PgTickerCatalog {
    pool: PgPool,
}

impl PgTickerCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TickerCatalog for PgTickerCatalog {
    async fn ticker_exists(&self, ticker: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM companies WHERE ticker = $1)",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
