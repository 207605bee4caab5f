use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

use crate::external::market_data::MarketDataError;
use crate::services::indicator_math::IndicatorError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream market data unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream market data malformed: {0}")]
    MalformedUpstream(String),
    #[error("Indicator calculation error: {0}")]
    Indicator(#[from] IndicatorError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::UnknownTicker(ticker) => {
                (StatusCode::BAD_REQUEST, format!("Unknown ticker: {}", ticker)).into_response()
            }
            AppError::UpstreamUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::MalformedUpstream(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::Db(_) | AppError::Indicator(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        AppError::Db(value)
    }
}

// Transient transport failures surface as gateway errors; contract
// violations keep their own status so callers can tell them apart.
impl From<MarketDataError> for AppError {
    fn from(value: MarketDataError) -> Self {
        match value {
            MarketDataError::Network(_) | MarketDataError::RateLimited => {
                AppError::UpstreamUnavailable(value.to_string())
            }
            MarketDataError::BadResponse(_) | MarketDataError::Parse(_) => {
                AppError::MalformedUpstream(value.to_string())
            }
        }
    }
}
