use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Candle resolutions the upstream accepts. Anything else is rejected at
/// the request boundary rather than forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
    Day,
    Week,
    Month,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Min1 => "1",
            Resolution::Min5 => "5",
            Resolution::Min15 => "15",
            Resolution::Min30 => "30",
            Resolution::Min60 => "60",
            Resolution::Day => "D",
            Resolution::Week => "W",
            Resolution::Month => "M",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Resolution::Min1),
            "5" => Ok(Resolution::Min5),
            "15" => Ok(Resolution::Min15),
            "30" => Ok(Resolution::Min30),
            "60" => Ok(Resolution::Min60),
            "D" => Ok(Resolution::Day),
            "W" => Ok(Resolution::Week),
            "M" => Ok(Resolution::Month),
            _ => Err(format!("unsupported resolution: {}", s)),
        }
    }
}

/// Validated ordered close-price series. Timestamps are epoch seconds,
/// non-decreasing; closes are finite. Construct via `new`; providers never
/// hand out an unchecked series.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    timestamps: Vec<i64>,
    closes: Vec<f64>,
}

impl CandleSeries {
    pub fn new(timestamps: Vec<i64>, closes: Vec<f64>) -> Result<Self, MarketDataError> {
        if timestamps.is_empty() || closes.is_empty() {
            return Err(MarketDataError::BadResponse("empty candle series".into()));
        }
        if timestamps.len() != closes.len() {
            return Err(MarketDataError::BadResponse(format!(
                "candle arrays disagree: {} timestamps vs {} closes",
                timestamps.len(),
                closes.len()
            )));
        }
        if let Some(w) = timestamps.windows(2).find(|w| w[1] < w[0]) {
            return Err(MarketDataError::BadResponse(format!(
                "timestamps not ordered: {} after {}",
                w[1], w[0]
            )));
        }
        if let Some(idx) = closes.iter().position(|c| !c.is_finite()) {
            return Err(MarketDataError::BadResponse(format!(
                "non-finite close at index {}",
                idx
            )));
        }
        Ok(Self { timestamps, closes })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Collapses the series to a UTC-date -> close map. With daily bars this
    /// is one entry per bar; finer resolutions keep the last close per day.
    pub fn daily_closes(&self) -> BTreeMap<NaiveDate, f64> {
        self.timestamps
            .iter()
            .zip(&self.closes)
            .filter_map(|(&ts, &close)| {
                DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| (dt.date_naive(), close))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,
}

#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        count: u32,
    ) -> Result<CandleSeries, MarketDataError>;
}

/// Live-quote lookup. A missing quote is a normal outcome (`Ok(None)`), not
/// an error; `Err` is reserved for transport/contract failures.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError>;
}
