use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::external::market_data::{
    CandleSeries, CandleSource, MarketDataError, Quote, QuoteSource, Resolution,
};

pub const CANDLE_TTL: Duration = Duration::from_secs(120);
pub const QUOTE_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub symbol: String,
    pub resolution: Resolution,
    pub count: u32,
}

struct CachedSeries {
    series: CandleSeries,
    fetched_at: Instant,
}

/// Shared TTL cache in front of the candle source, keyed by
/// `(symbol, resolution, count)`. Concurrent misses for one key serialize on
/// a per-key lock so only the first caller goes upstream.
pub struct CandleCache {
    ttl: Duration,
    entries: DashMap<CandleKey, CachedSeries>,
    locks: DashMap<CandleKey, Arc<Mutex<()>>>,
}

impl CandleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn lookup(&self, key: &CandleKey) -> Option<CandleSeries> {
        if let Some(entry) = self.entries.get(key) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.series.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    pub async fn get_or_fetch(
        &self,
        source: &dyn CandleSource,
        symbol: &str,
        resolution: Resolution,
        count: u32,
    ) -> Result<CandleSeries, MarketDataError> {
        let key = CandleKey {
            symbol: symbol.to_string(),
            resolution,
            count,
        };

        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Someone may have filled the entry while we waited on the lock.
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let series = source.fetch_candles(symbol, resolution, count).await?;
        self.entries.insert(
            key,
            CachedSeries {
                series: series.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(series)
    }
}

struct CachedQuote {
    quote: Quote,
    fetched_at: Instant,
}

/// TTL cache for live quotes keyed by symbol. Only resolved quotes are
/// cached; absence is re-checked every time so a ticker coming online is
/// picked up immediately.
pub struct QuoteCache {
    ttl: Duration,
    entries: DashMap<String, CachedQuote>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn lookup(&self, symbol: &str) -> Option<Quote> {
        if let Some(entry) = self.entries.get(symbol) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.quote.clone());
            }
            drop(entry);
            self.entries.remove(symbol);
        }
        None
    }

    pub async fn get_or_fetch(
        &self,
        source: &dyn QuoteSource,
        symbol: &str,
    ) -> Result<Option<Quote>, MarketDataError> {
        if let Some(hit) = self.lookup(symbol) {
            return Ok(Some(hit));
        }

        let quote = source.latest_quote(symbol).await?;
        if let Some(q) = &quote {
            self.entries.insert(
                symbol.to_string(),
                CachedQuote {
                    quote: q.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCandleSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CandleSource for CountingCandleSource {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _resolution: Resolution,
            count: u32,
        ) -> Result<CandleSeries, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Hold the slot briefly so concurrent misses overlap.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let n = count as usize;
            CandleSeries::new(
                (0..n).map(|i| i as i64 * 86_400).collect(),
                (0..n).map(|i| 100.0 + i as f64).collect(),
            )
        }
    }

    struct CountingQuoteSource {
        calls: AtomicUsize,
        quote: Option<Quote>,
    }

    #[async_trait]
    impl QuoteSource for CountingQuoteSource {
        async fn latest_quote(&self, _symbol: &str) -> Result<Option<Quote>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.quote.clone())
        }
    }

    #[tokio::test]
    async fn candle_cache_serves_repeat_requests_from_memory() {
        let cache = CandleCache::new(Duration::from_secs(60));
        let source = CountingCandleSource { calls: AtomicUsize::new(0) };

        let a = cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 5)
            .await
            .unwrap();
        let b = cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 5)
            .await
            .unwrap();

        assert_eq!(a.closes(), b.closes());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn candle_cache_distinguishes_keys() {
        let cache = CandleCache::new(Duration::from_secs(60));
        let source = CountingCandleSource { calls: AtomicUsize::new(0) };

        cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 5)
            .await
            .unwrap();
        cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 10)
            .await
            .unwrap();
        cache
            .get_or_fetch(&source, "AAPL", Resolution::Week, 5)
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn expired_candle_entry_is_refetched() {
        let cache = CandleCache::new(Duration::ZERO);
        let source = CountingCandleSource { calls: AtomicUsize::new(0) };

        cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 5)
            .await
            .unwrap();
        cache
            .get_or_fetch(&source, "AAPL", Resolution::Day, 5)
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_collapse_to_one_upstream_call() {
        let cache = Arc::new(CandleCache::new(Duration::from_secs(60)));
        let source = Arc::new(CountingCandleSource { calls: AtomicUsize::new(0) });

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let source = source.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(source.as_ref(), "NVDA", Resolution::Day, 30)
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn quote_cache_caches_hits_but_not_misses() {
        let cache = QuoteCache::new(Duration::from_secs(60));

        let missing = CountingQuoteSource { calls: AtomicUsize::new(0), quote: None };
        assert!(cache.get_or_fetch(&missing, "ZZZZ").await.unwrap().is_none());
        assert!(cache.get_or_fetch(&missing, "ZZZZ").await.unwrap().is_none());
        // Absence is never cached.
        assert_eq!(missing.calls.load(Ordering::SeqCst), 2);

        let present = CountingQuoteSource {
            calls: AtomicUsize::new(0),
            quote: Some(Quote { price: 123.0, as_of: Utc::now() }),
        };
        let a = cache.get_or_fetch(&present, "AAPL").await.unwrap().unwrap();
        let b = cache.get_or_fetch(&present, "AAPL").await.unwrap().unwrap();
        assert_eq!(a.price, b.price);
        assert_eq!(present.calls.load(Ordering::SeqCst), 1);
    }
}
