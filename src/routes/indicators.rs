use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::external::market_data::Resolution;
use crate::models::{IndicatorRequest, IndicatorResponse};
use crate::services;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:ticker", get(get_indicators))
}

#[derive(Debug, Deserialize)]
struct IndicatorQuery {
    resolution: Option<String>,
    count: Option<u32>,
    sma: Option<String>,
    ema: Option<String>,
    rsi: Option<String>,
}

/// Parses a comma-separated period list, dropping empty and non-numeric
/// tokens. Range clamping and de-duplication happen in the service.
fn parse_period_list(raw: Option<&str>) -> Vec<i64> {
    raw.map(|s| {
        s.split(',')
            .filter_map(|token| token.trim().parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

async fn get_indicators(
    Path(ticker): Path<String>,
    Query(params): Query<IndicatorQuery>,
    State(state): State<AppState>,
) -> Result<Json<IndicatorResponse>, AppError> {
    info!("GET /indicators/{} - Computing overlays", ticker);

    let resolution: Resolution = params
        .resolution
        .as_deref()
        .unwrap_or("D")
        .parse()
        .map_err(AppError::Validation)?;

    let request = IndicatorRequest {
        ticker: ticker.trim().to_uppercase(),
        resolution,
        count: params.count,
        sma_periods: parse_period_list(params.sma.as_deref()),
        ema_periods: parse_period_list(params.ema.as_deref()),
        rsi_periods: parse_period_list(params.rsi.as_deref()),
    };

    let response = services::indicator_service::get_indicators(
        state.catalog.as_ref(),
        &state.candle_cache,
        state.candles.as_ref(),
        request,
    )
    .await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_list_drops_non_numeric_tokens() {
        assert_eq!(parse_period_list(Some("20, 50,abc,,7")), vec![20, 50, 7]);
        assert_eq!(parse_period_list(Some("-5,1")), vec![-5, 1]);
        assert!(parse_period_list(Some("")).is_empty());
        assert!(parse_period_list(None).is_empty());
    }
}
