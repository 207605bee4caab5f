use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Reference catalog entry; tickers must exist here before indicators or
// holdings can reference them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
