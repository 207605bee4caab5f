use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Represents a logical grouping of investments (e.g., "Long-term", "Speculative").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePortfolio {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePortfolio {
    pub name: String,
    pub description: Option<String>,
}

impl Portfolio {
    pub(crate) fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            description,
            created_at: chrono::Utc::now(),
        }
    }
}
