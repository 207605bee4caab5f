use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Holding, UpsertHolding};

pub async fn fetch_for_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Vec<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "SELECT id, portfolio_id, ticker, quantity, average_cost,
                min_threshold, max_threshold, created_at
         FROM portfolio_holdings
         WHERE portfolio_id = $1
         ORDER BY ticker ASC",
    )
    .bind(portfolio_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "SELECT id, portfolio_id, ticker, quantity, average_cost,
                min_threshold, max_threshold, created_at
         FROM portfolio_holdings
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

// Upsert keyed on (portfolio_id, ticker): a second write for the same ticker
// replaces quantity/cost/thresholds instead of creating a duplicate row.
pub async fn upsert(
    pool: &PgPool,
    portfolio_id: Uuid,
    input: &UpsertHolding,
) -> Result<Holding, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "INSERT INTO portfolio_holdings
             (id, portfolio_id, ticker, quantity, average_cost,
              min_threshold, max_threshold)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (portfolio_id, ticker)
         DO UPDATE SET quantity = EXCLUDED.quantity,
                       average_cost = EXCLUDED.average_cost,
                       min_threshold = EXCLUDED.min_threshold,
                       max_threshold = EXCLUDED.max_threshold
         RETURNING id, portfolio_id, ticker, quantity, average_cost,
                   min_threshold, max_threshold, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(portfolio_id)
    .bind(&input.ticker)
    .bind(input.quantity)
    .bind(input.average_cost)
    .bind(input.min_threshold)
    .bind(input.max_threshold)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, portfolio_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM portfolio_holdings WHERE id = $1 AND portfolio_id = $2",
    )
    .bind(id)
    .bind(portfolio_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
