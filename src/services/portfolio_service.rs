use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::db::catalog::TickerCatalog;
use crate::errors::AppError;
use crate::models::{CreatePortfolio, Holding, Portfolio, UpdatePortfolio, UpsertHolding};

pub async fn create(pool: &PgPool, input: CreatePortfolio) -> Result<Portfolio, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Portfolio name cannot be empty".into()));
    }
    let new_portfolio = Portfolio::new(input.name, input.description);
    let portfolio = db::portfolio_queries::insert(pool, new_portfolio).await?;
    Ok(portfolio)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdatePortfolio,
) -> Result<Portfolio, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Portfolio name cannot be empty".into()));
    }
    let portfolio = db::portfolio_queries::update(pool, id, input)
        .await?
        .ok_or(AppError::NotFound("Portfolio not found".to_string()))?;
    Ok(portfolio)
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Portfolio>, AppError> {
    let portfolios = db::portfolio_queries::fetch_all(pool).await?;
    Ok(portfolios)
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Portfolio, AppError> {
    let portfolio = db::portfolio_queries::fetch_one(pool, id)
        .await?
        .ok_or(AppError::NotFound("Portfolio not found".to_string()))?;
    Ok(portfolio)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    match db::portfolio_queries::delete(pool, id).await {
        Ok(0) => Err(AppError::NotFound("Portfolio not found".to_string())),
        Ok(_) => Ok(()),
        Err(e) => Err(AppError::from(e)),
    }
}

pub async fn list_holdings(pool: &PgPool, portfolio_id: Uuid) -> Result<Vec<Holding>, AppError> {
    fetch_one(pool, portfolio_id).await?;
    let holdings = db::holding_queries::fetch_for_portfolio(pool, portfolio_id).await?;
    Ok(holdings)
}

pub async fn upsert_holding(
    pool: &PgPool,
    catalog: &dyn TickerCatalog,
    portfolio_id: Uuid,
    mut input: UpsertHolding,
) -> Result<Holding, AppError> {
    fetch_one(pool, portfolio_id).await?;

    input.ticker = input.ticker.trim().to_uppercase();
    if input.ticker.is_empty() {
        return Err(AppError::Validation("Ticker is required".into()));
    }
    if !catalog.ticker_exists(&input.ticker).await? {
        return Err(AppError::UnknownTicker(input.ticker));
    }
    if input.quantity < 0.0 || !input.quantity.is_finite() {
        return Err(AppError::Validation("Quantity must be non-negative".into()));
    }
    if input.average_cost < 0.0 || !input.average_cost.is_finite() {
        return Err(AppError::Validation("Average cost must be non-negative".into()));
    }
    validate_thresholds(input.min_threshold, input.max_threshold)?;

    let holding = db::holding_queries::upsert(pool, portfolio_id, &input).await?;
    Ok(holding)
}

pub async fn remove_holding(
    pool: &PgPool,
    portfolio_id: Uuid,
    holding_id: Uuid,
) -> Result<(), AppError> {
    fetch_one(pool, portfolio_id).await?;
    match db::holding_queries::delete(pool, portfolio_id, holding_id).await {
        Ok(0) => Err(AppError::NotFound("Holding not found".to_string())),
        Ok(_) => Ok(()),
        Err(e) => Err(AppError::from(e)),
    }
}

fn validate_thresholds(min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::Validation(
                "Minimum threshold cannot be greater than maximum threshold".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_accept_missing_sides() {
        assert!(validate_thresholds(None, None).is_ok());
        assert!(validate_thresholds(Some(1.0), None).is_ok());
        assert!(validate_thresholds(None, Some(2.0)).is_ok());
    }

    #[test]
    fn thresholds_reject_inverted_range() {
        assert!(validate_thresholds(Some(3.0), Some(2.0)).is_err());
        assert!(validate_thresholds(Some(2.0), Some(2.0)).is_ok());
    }
}
