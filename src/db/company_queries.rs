use sqlx::PgPool;

use crate::models::Company;

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "SELECT ticker, name, sector, country, created_at
         FROM companies
         ORDER BY ticker ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, ticker: &str) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "SELECT ticker, name, sector, country, created_at
         FROM companies
         WHERE ticker = $1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}
