use tracing::warn;

use crate::db::catalog::TickerCatalog;
use crate::errors::AppError;
use crate::external::market_data::CandleSource;
use crate::models::{IndicatorOverlay, IndicatorPoint, IndicatorRequest, IndicatorResponse, OverlayKind};
use crate::services::indicator_math;
use crate::services::market_cache::CandleCache;

const DEFAULT_COUNT: u32 = 200;
const MAX_COUNT: u32 = 500;
const MIN_PERIOD: usize = 2;
const MAX_PERIOD: usize = 365;
// Bars requested beyond the largest period, so every overlay has at least
// this many defined values after warm-up.
const WARM_BARS: u32 = 10;

const DEFAULT_SMA_PERIOD: usize = 20;
const DEFAULT_EMA_PERIOD: usize = 20;
const DEFAULT_RSI_PERIOD: usize = 14;

/// Cleans a requested period list: absolute values, clamped to
/// `[2, 365]`, de-duplicated preserving first-seen order. An empty result
/// falls back to the family default so a bare request still charts something.
pub fn sanitize_periods(periods: &[i64], fallback: usize) -> Vec<usize> {
    let mut unique: Vec<usize> = Vec::new();
    for &value in periods {
        let p = value.unsigned_abs() as usize;
        if (MIN_PERIOD..=MAX_PERIOD).contains(&p) && !unique.contains(&p) {
            unique.push(p);
        }
    }
    if unique.is_empty() {
        unique.push(fallback);
    }
    unique
}

/// How many bars to request upstream: enough to warm the largest period,
/// honouring the caller's count when bigger, hard-capped at the provider
/// maximum.
pub fn required_count(max_period: usize, requested: Option<u32>) -> u32 {
    let requested = match requested {
        Some(c) if c > 0 => c,
        _ => DEFAULT_COUNT,
    };
    let floor = max_period as u32 + WARM_BARS;
    floor.max(requested).min(MAX_COUNT)
}

/// Computes the requested overlays over one shared candle fetch. Any
/// upstream failure aborts the whole request; partial overlay sets are
/// never returned.
pub async fn get_indicators(
    catalog: &dyn TickerCatalog,
    cache: &CandleCache,
    source: &dyn CandleSource,
    request: IndicatorRequest,
) -> Result<IndicatorResponse, AppError> {
    if !catalog.ticker_exists(&request.ticker).await? {
        return Err(AppError::UnknownTicker(request.ticker));
    }

    let mut sma_periods = sanitize_periods(&request.sma_periods, DEFAULT_SMA_PERIOD);
    let mut ema_periods = sanitize_periods(&request.ema_periods, DEFAULT_EMA_PERIOD);
    let mut rsi_periods = sanitize_periods(&request.rsi_periods, DEFAULT_RSI_PERIOD);
    sma_periods.sort_unstable();
    ema_periods.sort_unstable();
    rsi_periods.sort_unstable();

    let max_period = sma_periods
        .iter()
        .chain(&ema_periods)
        .chain(&rsi_periods)
        .copied()
        .max()
        .unwrap_or(1);

    let count = required_count(max_period, request.count);

    let series = cache
        .get_or_fetch(source, &request.ticker, request.resolution, count)
        .await
        .map_err(|e| {
            warn!("Candle fetch failed for {}: {}", request.ticker, e);
            AppError::from(e)
        })?;

    let closes = series.closes();
    let timestamps = series.timestamps();

    type IndicatorFn = fn(&[f64], usize) -> Result<Vec<Option<f64>>, indicator_math::IndicatorError>;
    let families: [(OverlayKind, &Vec<usize>, IndicatorFn); 3] = [
        (OverlayKind::Sma, &sma_periods, indicator_math::sma),
        (OverlayKind::Ema, &ema_periods, indicator_math::ema),
        (OverlayKind::Rsi, &rsi_periods, indicator_math::rsi),
    ];

    let mut overlays = Vec::new();
    let mut overlay_values: Vec<Vec<Option<f64>>> = Vec::new();
    for (kind, periods, compute) in families {
        for &period in periods.iter() {
            overlays.push(IndicatorOverlay::new(kind, period));
            overlay_values.push(compute(closes, period)?);
        }
    }

    let points = timestamps
        .iter()
        .zip(closes)
        .enumerate()
        .map(|(i, (&ts, &close))| {
            let values = overlays
                .iter()
                .zip(&overlay_values)
                .filter_map(|(overlay, series)| series[i].map(|v| (overlay.key.clone(), v)))
                .collect();
            IndicatorPoint {
                timestamp: ts * 1_000,
                close,
                overlays: values,
            }
        })
        .collect();

    Ok(IndicatorResponse {
        ticker: request.ticker,
        resolution: request.resolution.to_string(),
        overlays,
        points,
    })
}
