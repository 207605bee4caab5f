use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// A position in a single instrument within a portfolio. Quantity and average
// cost are non-negative; thresholds drive alerting elsewhere and are only
// validated (min <= max) here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub id: uuid::Uuid,
    pub portfolio_id: uuid::Uuid,
    pub ticker: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertHolding {
    pub ticker: String,
    // Missing quantity/cost read as zero rather than rejecting the request.
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub average_cost: f64,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
}

impl Holding {
    pub fn invested(&self) -> f64 {
        self.quantity * self.average_cost
    }
}
