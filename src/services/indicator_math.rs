//! Pure indicator math over close-price series. No I/O, no state.
//!
//! Every function returns a vector aligned with the input: `None` while the
//! warm-up window is still filling, `Some(value)` once the indicator is
//! defined. Period bounds are enforced here, never silently tolerated;
//! callers sanitize their period lists before reaching this module.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("price series is empty")]
    EmptySeries,
    #[error("period {period} out of range for series of length {len}")]
    InvalidPeriod { period: usize, len: usize },
    #[error("non-finite price at index {index}")]
    NonFinitePrice { index: usize },
}

fn validate(closes: &[f64], period: usize) -> Result<(), IndicatorError> {
    if closes.is_empty() {
        return Err(IndicatorError::EmptySeries);
    }
    if period == 0 || period > closes.len() {
        return Err(IndicatorError::InvalidPeriod {
            period,
            len: closes.len(),
        });
    }
    if let Some(index) = closes.iter().position(|c| !c.is_finite()) {
        return Err(IndicatorError::NonFinitePrice { index });
    }
    Ok(())
}

/// Simple Moving Average. Running sum with the element leaving the window
/// subtracted, so the whole series costs O(n) regardless of period.
pub fn sma(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    validate(closes, period)?;

    let result = closes
        .iter()
        .enumerate()
        .scan(0.0_f64, |sum, (i, &price)| {
            *sum += price;
            if i >= period {
                *sum -= closes[i - period];
            }

            let out = if i + 1 >= period {
                Some(*sum / period as f64)
            } else {
                None
            };

            Some(out)
        })
        .collect();

    Ok(result)
}

/// Exponential Moving Average with multiplier `k = 2 / (period + 1)`.
/// The first defined value (index `period - 1`) is the arithmetic mean of
/// the first `period` closes; the EMA recurrence only runs after that seed.
pub fn ema(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    validate(closes, period)?;

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = vec![None; closes.len()];
    let mut prev = 0.0_f64;

    for (i, &price) in closes.iter().enumerate() {
        if i + 1 < period {
            continue;
        }
        if i + 1 == period {
            // Seed: plain average of the first `period` closes.
            prev = closes[..period].iter().sum::<f64>() / period as f64;
        } else {
            prev = (price - prev) * multiplier + prev;
        }
        result[i] = Some(prev);
    }

    Ok(result)
}

/// Relative Strength Index, Wilder's method. Gains and losses accumulate
/// from index 1; the averages seed at index `period - 1` and Wilder
/// smoothing `(avg * (period - 1) + x) / period` runs from `period` on.
/// `avg_loss == 0` pins RSI at 100.
pub fn rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    validate(closes, period)?;
    if period < 2 {
        return Err(IndicatorError::InvalidPeriod {
            period,
            len: closes.len(),
        });
    }

    let mut result = vec![None; closes.len()];
    let mut avg_gain = 0.0_f64;
    let mut avg_loss = 0.0_f64;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i < period {
            avg_gain += gain;
            avg_loss += loss;
            if i == period - 1 {
                avg_gain /= period as f64;
                avg_loss /= period as f64;
                result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
            }
        } else {
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
            result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
        }
    }

    Ok(result)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
