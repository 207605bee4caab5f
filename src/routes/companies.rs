use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::db;
use crate::errors::AppError;
use crate::models::Company;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies))
        .route("/:ticker", get(get_company))
}

async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<Company>>, AppError> {
    let companies = db::company_queries::fetch_all(&state.pool).await?;
    Ok(Json(companies))
}

async fn get_company(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Company>, AppError> {
    let ticker = ticker.trim().to_uppercase();
    let company = db::company_queries::fetch_one(&state.pool, &ticker)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company not found for ticker: {}", ticker)))?;
    Ok(Json(company))
}
