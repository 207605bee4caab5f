use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::external::market_data::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "RSI")]
    Rsi,
}

impl OverlayKind {
    pub fn key_prefix(&self) -> &'static str {
        match self {
            OverlayKind::Sma => "sma",
            OverlayKind::Ema => "ema",
            OverlayKind::Rsi => "rsi",
        }
    }

    pub fn label_prefix(&self) -> &'static str {
        match self {
            OverlayKind::Sma => "SMA",
            OverlayKind::Ema => "EMA",
            OverlayKind::Rsi => "RSI",
        }
    }
}

// Overlay definition the chart renders a series for, e.g. key "sma-20",
// label "SMA (20)". Keys are unique within a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorOverlay {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub period: usize,
}

impl IndicatorOverlay {
    pub fn new(kind: OverlayKind, period: usize) -> Self {
        Self {
            key: format!("{}-{}", kind.key_prefix(), period),
            label: format!("{} ({})", kind.label_prefix(), period),
            kind,
            period,
        }
    }
}

// One point per input bar. Overlay values are omitted (not null-filled)
// before an indicator's warm-up window completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub close: f64,
    pub overlays: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct IndicatorRequest {
    pub ticker: String,
    pub resolution: Resolution,
    pub count: Option<u32>,
    pub sma_periods: Vec<i64>,
    pub ema_periods: Vec<i64>,
    pub rsi_periods: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorResponse {
    pub ticker: String,
    pub resolution: String,
    pub overlays: Vec<IndicatorOverlay>,
    pub points: Vec<IndicatorPoint>,
}
