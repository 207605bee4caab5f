use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::PortfolioSnapshot;

/// Persistence seam for daily snapshots. The backing store's uniqueness
/// constraint on `(portfolio_id, snapshot_date)` is the source of truth for
/// idempotence: `insert_if_absent` reports whether a row was written and
/// must never overwrite an existing date.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn exists(&self, portfolio_id: Uuid, date: NaiveDate) -> Result<bool, AppError>;

    /// Returns `true` when the snapshot was written, `false` when the
    /// `(portfolio, date)` pair was already present (including a racing
    /// duplicate rejected by the constraint).
    async fn insert_if_absent(&self, snapshot: &PortfolioSnapshot) -> Result<bool, AppError>;

    async fn list_ascending(&self, portfolio_id: Uuid)
        -> Result<Vec<PortfolioSnapshot>, AppError>;
}

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn exists(&self, portfolio_id: Uuid, date: NaiveDate) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM portfolio_history
                WHERE portfolio_id = $1 AND snapshot_date = $2
            )",
        )
        .bind(portfolio_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_if_absent(&self, snapshot: &PortfolioSnapshot) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO portfolio_history
                 (id, portfolio_id, snapshot_date, captured_at,
                  invested, market_value, pnl_abs, pnl_pct, stale_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (portfolio_id, snapshot_date) DO NOTHING",
        )
        .bind(snapshot.id)
        .bind(snapshot.portfolio_id)
        .bind(snapshot.snapshot_date)
        .bind(snapshot.captured_at)
        .bind(snapshot.invested)
        .bind(snapshot.market_value)
        .bind(snapshot.pnl_abs)
        .bind(snapshot.pnl_pct)
        .bind(snapshot.stale_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_ascending(
        &self,
        portfolio_id: Uuid,
    ) -> Result<Vec<PortfolioSnapshot>, AppError> {
        let snapshots = sqlx::query_as::<_, PortfolioSnapshot>(
            "SELECT id, portfolio_id, snapshot_date, captured_at,
                    invested, market_value, pnl_abs, pnl_pct, stale_count
             FROM portfolio_history
             WHERE portfolio_id = $1
             ORDER BY snapshot_date ASC",
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }
}
