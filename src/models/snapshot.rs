use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// One persisted aggregate valuation per portfolio per UTC calendar day.
// Rows are append-only: a later run for the same date is skipped, never
// rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioSnapshot {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub snapshot_date: NaiveDate,
    pub captured_at: DateTime<Utc>,
    pub invested: f64,
    pub market_value: f64,
    pub pnl_abs: f64,
    pub pnl_pct: f64,
    pub stale_count: i32,
}

impl PortfolioSnapshot {
    pub fn new(
        portfolio_id: Uuid,
        snapshot_date: NaiveDate,
        captured_at: DateTime<Utc>,
        invested: f64,
        market_value: f64,
        stale_count: i32,
    ) -> Self {
        let pnl_abs = market_value - invested;
        let pnl_pct = if invested != 0.0 { pnl_abs / invested } else { 0.0 };
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            snapshot_date,
            captured_at,
            invested,
            market_value,
            pnl_abs,
            pnl_pct,
            stale_count,
        }
    }
}

// History row as served to clients; identical shape whether it came from
// storage or from on-demand reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioHistoryPoint {
    pub snapshot_date: NaiveDate,
    pub captured_at: DateTime<Utc>,
    pub invested: f64,
    pub market_value: f64,
    pub pnl_abs: f64,
    pub pnl_pct: f64,
    pub stale_count: i32,
}

impl From<PortfolioSnapshot> for PortfolioHistoryPoint {
    fn from(s: PortfolioSnapshot) -> Self {
        Self {
            snapshot_date: s.snapshot_date,
            captured_at: s.captured_at,
            invested: s.invested,
            market_value: s.market_value,
            pnl_abs: s.pnl_abs,
            pnl_pct: s.pnl_pct,
            stale_count: s.stale_count,
        }
    }
}
