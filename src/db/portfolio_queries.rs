use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Portfolio, UpdatePortfolio};

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "SELECT id, name, description, created_at
         FROM portfolios
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_all_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM portfolios ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "SELECT id, name, description, created_at
         FROM portfolios
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert(pool: &PgPool, portfolio: Portfolio) -> Result<Portfolio, sqlx::Error> {
    sqlx::query(
        "INSERT INTO portfolios (id, name, description, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(portfolio.id)
    .bind(&portfolio.name)
    .bind(&portfolio.description)
    .bind(portfolio.created_at)
    .execute(pool)
    .await?;

    Ok(portfolio)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdatePortfolio,
) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        "UPDATE portfolios
         SET name = $2, description = $3
         WHERE id = $1
         RETURNING id, name, description, created_at",
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM portfolios WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
