use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::external::market_data::{
    CandleSeries, CandleSource, MarketDataError, Quote, QuoteSource, Resolution,
};

/// Offline provider for local development without an API key: a random walk
/// seeded from the symbol, so repeated requests for one ticker agree with
/// each other.
pub struct MockMarketData;

impl MockMarketData {
    pub fn new() -> Self {
        Self
    }

    fn walk(symbol: &str, steps: usize) -> Vec<f64> {
        let seed = symbol.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = 50.0 + (seed % 200) as f64;
        let mut closes = Vec::with_capacity(steps);
        for _ in 0..steps {
            current *= 1.0 + (rng.random::<f64>() - 0.5) * 0.02;
            closes.push(current);
        }
        closes
    }

    fn bar_spacing(resolution: Resolution) -> i64 {
        match resolution {
            Resolution::Min1 => 60,
            Resolution::Min5 => 300,
            Resolution::Min15 => 900,
            Resolution::Min30 => 1_800,
            Resolution::Min60 => 3_600,
            Resolution::Day => 86_400,
            Resolution::Week => 7 * 86_400,
            Resolution::Month => 30 * 86_400,
        }
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleSource for MockMarketData {
    async fn fetch_candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        count: u32,
    ) -> Result<CandleSeries, MarketDataError> {
        let count = count.max(1) as usize;
        let spacing = Self::bar_spacing(resolution);
        // Align the last bar to a spacing boundary so daily bars land on
        // stable UTC dates.
        let end = (Utc::now().timestamp() / spacing) * spacing;
        let start = end - spacing * (count as i64 - 1);

        let timestamps: Vec<i64> = (0..count).map(|i| start + spacing * i as i64).collect();
        let closes = Self::walk(symbol, count);

        CandleSeries::new(timestamps, closes)
    }
}

#[async_trait]
impl QuoteSource for MockMarketData {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let price = Self::walk(symbol, 1).pop().unwrap_or(100.0);
        Ok(Some(Quote {
            price,
            as_of: Utc::now() - Duration::seconds(1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn candles_are_deterministic_per_symbol() {
        let mock = MockMarketData::new();
        let a = mock.fetch_candles("AAPL", Resolution::Day, 30).await.unwrap();
        let b = mock.fetch_candles("AAPL", Resolution::Day, 30).await.unwrap();
        assert_eq!(a.closes(), b.closes());

        let c = mock.fetch_candles("MSFT", Resolution::Day, 30).await.unwrap();
        assert_ne!(a.closes(), c.closes());
    }

    #[tokio::test]
    async fn daily_candles_cover_distinct_dates() {
        let mock = MockMarketData::new();
        let series = mock.fetch_candles("AAPL", Resolution::Day, 10).await.unwrap();
        assert_eq!(series.daily_closes().len(), 10);
    }
}
