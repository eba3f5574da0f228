//! Provider-shaped payloads, kept as decoded so they can be cached before normalization.

use crate::core::quote::ProviderKind;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub enum ProviderPayload {
    Chart(ChartPayload),
    Finnhub(FinnhubPayload),
    Flexible(FlexibleQuote),
}

impl ProviderPayload {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderPayload::Chart(_) => ProviderKind::Primary,
            ProviderPayload::Finnhub(_) => ProviderKind::BackupA,
            ProviderPayload::Flexible(_) => ProviderKind::BackupB,
        }
    }
}

// Primary chart API

#[derive(Deserialize, Debug)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Deserialize, Debug)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartPayload>>,
    pub error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChartPayload {
    pub meta: ChartMeta,
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Option<ChartIndicators>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub regular_market_volume: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub market_state: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<ChartQuote>,
}

/// OHLCV columns aligned by index with `ChartPayload::timestamp`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChartQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

// Backup A (Finnhub)

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FinnhubQuote {
    /// Current price
    pub c: Option<f64>,
    /// Previous close
    pub pc: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,
    pub o: Option<f64>,
    pub v: Option<f64>,
    /// Unix seconds
    pub t: Option<i64>,
}

impl FinnhubQuote {
    /// Finnhub answers unknown tickers with a quote of zeros rather than an error.
    pub fn is_all_zero(&self) -> bool {
        [self.c, self.pc, self.h, self.l, self.o]
            .iter()
            .all(|v| v.unwrap_or(0.0) == 0.0)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FinnhubCandles {
    /// "ok" or "no_data"
    pub s: String,
    #[serde(default)]
    pub c: Vec<f64>,
    #[serde(default)]
    pub h: Vec<f64>,
    #[serde(default)]
    pub l: Vec<f64>,
    #[serde(default)]
    pub o: Vec<f64>,
    #[serde(default)]
    pub v: Vec<f64>,
    #[serde(default)]
    pub t: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct FinnhubPayload {
    pub quote: FinnhubQuote,
    pub candles: Option<FinnhubCandles>,
}

// Backup B, after field-name reconciliation

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlexibleQuote {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
    pub timestamp: Option<i64>,
    pub market_state: Option<String>,
}
