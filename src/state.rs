use std::sync::Arc;

use sqlx::PgPool;

use crate::db::catalog::TickerCatalog;
use crate::db::snapshot_store::SnapshotStore;
use crate::external::market_data::{CandleSource, QuoteSource};
use crate::services::market_cache::{CandleCache, QuoteCache};

// All collaborators are injected here rather than reached through globals,
// so every engine can be exercised against in-memory stand-ins.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<dyn TickerCatalog>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub candles: Arc<dyn CandleSource>,
    pub quotes: Arc<dyn QuoteSource>,
    pub candle_cache: Arc<CandleCache>,
    pub quote_cache: Arc<QuoteCache>,
}
