mod app;
mod db;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use crate::db::catalog::PgTickerCatalog;
use crate::db::snapshot_store::PgSnapshotStore;
use crate::external::finnhub::FinnhubClient;
use crate::external::market_data::{CandleSource, QuoteSource};
use crate::external::mock::MockMarketData;
use crate::logging::LoggingConfig;
use crate::services::job_scheduler_service::{JobContext, JobSchedulerService};
use crate::services::market_cache::{CandleCache, QuoteCache, CANDLE_TTL, QUOTE_TTL};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Candles and quotes come from the same upstream; MARKET_PROVIDER=mock
    // runs the whole service against a seeded random walk instead.
    let provider_name =
        std::env::var("MARKET_PROVIDER").unwrap_or_else(|_| "finnhub".to_string());

    let (candles, quotes): (Arc<dyn CandleSource>, Arc<dyn QuoteSource>) =
        match provider_name.to_lowercase().as_str() {
            "finnhub" => {
                tracing::info!("📊 Using market data provider: Finnhub");
                let client = Arc::new(
                    FinnhubClient::from_env()
                        .map_err(|e| anyhow::anyhow!("Failed to create Finnhub client: {}", e))?,
                );
                (client.clone(), client)
            }
            "mock" => {
                tracing::info!("📊 Using market data provider: mock random walk");
                let mock = Arc::new(MockMarketData::new());
                (mock.clone(), mock)
            }
            other => {
                anyhow::bail!("Invalid MARKET_PROVIDER: {}. Must be 'finnhub' or 'mock'", other);
            }
        };

    let state = AppState {
        pool: pool.clone(),
        catalog: Arc::new(PgTickerCatalog::new(pool.clone())),
        snapshots: Arc::new(PgSnapshotStore::new(pool.clone())),
        candles: candles.clone(),
        quotes: quotes.clone(),
        candle_cache: Arc::new(CandleCache::new(CANDLE_TTL)),
        quote_cache: Arc::new(QuoteCache::new(QUOTE_TTL)),
    };

    let job_context = JobContext {
        pool: pool.clone(),
        snapshots: state.snapshots.clone(),
        candles: state.candles.clone(),
        quotes: state.quotes.clone(),
        candle_cache: state.candle_cache.clone(),
        quote_cache: state.quote_cache.clone(),
    };
    let mut scheduler = JobSchedulerService::new(job_context).await?;
    scheduler.start().await?;

    let app = app::create_app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 FinSight backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
