use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    CreatePortfolio, Holding, Portfolio, PortfolioHistoryPoint, PortfolioValuation,
    UpdatePortfolio, UpsertHolding,
};
use crate::services;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_portfolios).post(create_portfolio))
        .route(
            "/:id",
            get(get_portfolio).put(update_portfolio).delete(delete_portfolio),
        )
        .route("/:id/holdings", get(list_holdings).put(upsert_holding))
        .route("/:id/holdings/:holding_id", delete(remove_holding))
        .route("/:id/valuation", get(get_valuation))
        .route("/:id/history", get(get_history))
}

async fn list_portfolios(
    State(state): State<AppState>,
) -> Result<Json<Vec<Portfolio>>, AppError> {
    let portfolios = services::portfolio_service::fetch_all(&state.pool).await?;
    Ok(Json(portfolios))
}

async fn create_portfolio(
    State(state): State<AppState>,
    Json(input): Json<CreatePortfolio>,
) -> Result<(StatusCode, Json<Portfolio>), AppError> {
    info!("POST /portfolios - Creating portfolio '{}'", input.name);
    let portfolio = services::portfolio_service::create(&state.pool, input).await?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

async fn get_portfolio(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Portfolio>, AppError> {
    let portfolio = services::portfolio_service::fetch_one(&state.pool, id).await?;
    Ok(Json(portfolio))
}

async fn update_portfolio(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<UpdatePortfolio>,
) -> Result<Json<Portfolio>, AppError> {
    let portfolio = services::portfolio_service::update(&state.pool, id, input).await?;
    Ok(Json(portfolio))
}

async fn delete_portfolio(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    services::portfolio_service::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_holdings(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Holding>>, AppError> {
    let holdings = services::portfolio_service::list_holdings(&state.pool, id).await?;
    Ok(Json(holdings))
}

async fn upsert_holding(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<UpsertHolding>,
) -> Result<Json<Holding>, AppError> {
    info!("PUT /portfolios/{}/holdings - Upserting {}", id, input.ticker);
    let holding = services::portfolio_service::upsert_holding(
        &state.pool,
        state.catalog.as_ref(),
        id,
        input,
    )
    .await?;
    Ok(Json(holding))
}

async fn remove_holding(
    Path((id, holding_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    services::portfolio_service::remove_holding(&state.pool, id, holding_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_valuation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioValuation>, AppError> {
    info!("GET /portfolios/{}/valuation - Marking to market", id);
    let valuation = services::valuation_service::get_valuation(
        &state.pool,
        &state.quote_cache,
        state.quotes.as_ref(),
        id,
    )
    .await?;
    Ok(Json(valuation))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    days: Option<u32>,
}

async fn get_history(
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PortfolioHistoryPoint>>, AppError> {
    info!("GET /portfolios/{}/history - Listing history", id);
    let points = services::history_service::list_history(
        &state.pool,
        state.snapshots.as_ref(),
        &state.candle_cache,
        state.candles.as_ref(),
        &state.quote_cache,
        state.quotes.as_ref(),
        id,
        params.days,
    )
    .await?;
    Ok(Json(points))
}
