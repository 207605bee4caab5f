use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{companies, health, indicators, portfolios};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/companies", companies::router())
        .nest("/api/indicators", indicators::router())
        .nest("/api/portfolios", portfolios::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
