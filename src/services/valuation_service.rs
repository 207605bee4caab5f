use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::external::market_data::{Quote, QuoteSource};
use crate::models::{Holding, HoldingValuation, PortfolioValuation, ValuationTotals};
use crate::services::market_cache::QuoteCache;

pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Marks each holding to market and aggregates portfolio totals. A holding
/// without a resolvable quote is reported stale, never treated as an error:
/// it keeps its invested amount in the totals but contributes nothing to
/// market value.
pub fn value_holdings(
    holdings: &[Holding],
    quotes: &HashMap<String, Quote>,
) -> (Vec<HoldingValuation>, ValuationTotals) {
    let mut total_invested = 0.0;
    let mut total_market_value = 0.0;
    let mut stale_count = 0;
    let mut rows = Vec::with_capacity(holdings.len());

    for holding in holdings {
        let invested = holding.invested();
        total_invested += invested;

        let mut row = HoldingValuation {
            ticker: holding.ticker.clone(),
            quantity: holding.quantity,
            average_cost: holding.average_cost,
            min_threshold: holding.min_threshold,
            max_threshold: holding.max_threshold,
            invested,
            last_price: None,
            price_as_of: None,
            market_value: None,
            pnl_abs: None,
            pnl_pct: None,
            stale: true,
        };

        if let Some(quote) = quotes.get(&holding.ticker) {
            let market_value = holding.quantity * quote.price;
            let pnl_abs = market_value - invested;
            row.last_price = Some(quote.price);
            row.price_as_of = Some(quote.as_of);
            row.market_value = Some(market_value);
            row.pnl_abs = Some(pnl_abs);
            row.pnl_pct = Some(if invested != 0.0 { pnl_abs / invested } else { 0.0 });
            row.stale = false;
            total_market_value += market_value;
        } else {
            stale_count += 1;
        }

        rows.push(row);
    }

    let invested = sanitize(total_invested);
    let market_value = sanitize(total_market_value);
    let pnl_abs = sanitize(market_value - invested);
    let pnl_pct = if invested != 0.0 {
        sanitize(pnl_abs / invested)
    } else {
        0.0
    };

    (
        rows,
        ValuationTotals {
            invested,
            market_value,
            pnl_abs,
            pnl_pct,
            stale_count,
        },
    )
}

/// Resolves quotes for a set of holdings concurrently through the cache.
/// Lookup failures degrade to absence: the affected holding comes out
/// stale, the rest of the portfolio is unaffected.
pub async fn resolve_quotes(
    cache: &QuoteCache,
    source: &dyn QuoteSource,
    holdings: &[Holding],
) -> HashMap<String, Quote> {
    let mut tickers: Vec<&str> = holdings.iter().map(|h| h.ticker.as_str()).collect();
    tickers.sort_unstable();
    tickers.dedup();

    let lookups = tickers.iter().map(|ticker| async move {
        match cache.get_or_fetch(source, ticker).await {
            Ok(quote) => (ticker.to_string(), quote),
            Err(e) => {
                warn!("Quote lookup failed for {}: {}", ticker, e);
                (ticker.to_string(), None)
            }
        }
    });

    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(ticker, quote)| quote.map(|q| (ticker, q)))
        .collect()
}

pub async fn get_valuation(
    pool: &PgPool,
    cache: &QuoteCache,
    source: &dyn QuoteSource,
    portfolio_id: Uuid,
) -> Result<PortfolioValuation, AppError> {
    let portfolio = db::portfolio_queries::fetch_one(pool, portfolio_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Portfolio not found".to_string()))?;

    let holdings = db::holding_queries::fetch_for_portfolio(pool, portfolio.id).await?;
    let quotes = resolve_quotes(cache, source, &holdings).await;
    let (rows, totals) = value_holdings(&holdings, &quotes);

    Ok(PortfolioValuation {
        portfolio_id: portfolio.id,
        updated_at: Utc::now(),
        totals,
        holdings: rows,
    })
}
