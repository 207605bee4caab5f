use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Derived per-holding valuation; never persisted. All market-derived fields
// stay None when no quote could be resolved and `stale` flags the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub ticker: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
    pub invested: f64,
    pub last_price: Option<f64>,
    pub price_as_of: Option<DateTime<Utc>>,
    pub market_value: Option<f64>,
    pub pnl_abs: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValuationTotals {
    pub invested: f64,
    pub market_value: f64,
    pub pnl_abs: f64,
    pub pnl_pct: f64,
    pub stale_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub portfolio_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub totals: ValuationTotals,
    pub holdings: Vec<HoldingValuation>,
}
