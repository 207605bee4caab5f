use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::external::market_data::{
    CandleSeries, CandleSource, MarketDataError, Quote, QuoteSource, Resolution,
};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct FinnhubClient {
    client: reqwest::Client,
    api_key: String,
}

impl FinnhubClient {
    pub fn from_env() -> Result<Self, MarketDataError> {
        let api_key = std::env::var("FINNHUB_API_KEY")
            .map_err(|_| MarketDataError::BadResponse("FINNHUB_API_KEY not set".into()))?;
        Self::new(api_key)
    }

    pub fn new(api_key: String) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        Ok(Self { client, api_key })
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubCandleResponse {
    #[serde(rename = "c")]
    close: Option<Vec<f64>>,
    #[serde(rename = "t")]
    timestamp: Option<Vec<i64>>,
    #[serde(rename = "s")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinnhubQuoteResponse {
    #[serde(rename = "c")]
    current: Option<f64>,
    #[serde(rename = "t")]
    timestamp: Option<i64>,
}

#[async_trait]
impl CandleSource for FinnhubClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        count: u32,
    ) -> Result<CandleSeries, MarketDataError> {
        let url = format!("{}/stock/candle", BASE_URL);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("resolution", resolution.as_str()),
                ("count", &count.to_string()),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        if resp.status().as_u16() == 429 {
            return Err(MarketDataError::RateLimited);
        }

        let body: FinnhubCandleResponse = resp
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        match body.status.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("ok") => {}
            Some(s) => {
                return Err(MarketDataError::BadResponse(format!(
                    "candle status '{}' for {}",
                    s, symbol
                )))
            }
            None => {
                return Err(MarketDataError::BadResponse(format!(
                    "candle response missing status for {}",
                    symbol
                )))
            }
        }

        let closes = body
            .close
            .ok_or_else(|| MarketDataError::BadResponse("missing close array".into()))?;
        let timestamps = body
            .timestamp
            .ok_or_else(|| MarketDataError::BadResponse("missing timestamp array".into()))?;

        CandleSeries::new(timestamps, closes)
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    async fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let url = format!("{}/quote", BASE_URL);

        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        if resp.status().as_u16() == 429 {
            return Err(MarketDataError::RateLimited);
        }

        let body: FinnhubQuoteResponse = resp
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        // Finnhub answers unknown symbols with zeroed fields rather than an
        // error; treat that the same as no quote.
        let quote = match body.current {
            Some(price) if price.is_finite() && price != 0.0 => {
                let as_of = body
                    .timestamp
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                    .unwrap_or_else(Utc::now);
                Some(Quote { price, as_of })
            }
            _ => None,
        };

        Ok(quote)
    }
}
