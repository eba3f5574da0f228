//! Maps each provider's payload onto the canonical [`QuoteRecord`].

use crate::core::error::ProviderError;
use crate::core::market_hours;
use crate::core::payload::{ChartPayload, FinnhubPayload, FlexibleQuote, ProviderPayload};
use crate::core::quote::{Candle, MarketState, MonitorStatus, ProviderKind, QuoteRecord};
use chrono::{DateTime, TimeZone, Utc};

pub fn normalize(
    payload: &ProviderPayload,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<QuoteRecord, ProviderError> {
    match payload {
        ProviderPayload::Chart(chart) => normalize_chart(chart, symbol, now),
        ProviderPayload::Finnhub(finnhub) => normalize_finnhub(finnhub, symbol, now),
        ProviderPayload::Flexible(quote) => normalize_flexible(quote, symbol, now),
    }
}

struct Fields {
    price: f64,
    previous_close: f64,
    volume: Option<u64>,
    market_state: MarketState,
    as_of: DateTime<Utc>,
    currency: Option<String>,
    history: Vec<Candle>,
}

fn build_record(symbol: &str, source: ProviderKind, fields: Fields) -> QuoteRecord {
    let change = fields.price - fields.previous_close;
    let change_percent = if fields.previous_close != 0.0 {
        change / fields.previous_close * 100.0
    } else {
        0.0
    };

    QuoteRecord {
        symbol: symbol.to_string(),
        price: fields.price,
        previous_close: fields.previous_close,
        change,
        change_percent,
        volume: fields.volume,
        market_state: fields.market_state,
        source,
        as_of: fields.as_of,
        currency: fields.currency,
        status: MonitorStatus::from_change_percent(change_percent),
        history: fields.history,
    }
}

/// Provider-declared state wins; the clock heuristic only fills the gap.
fn market_state(signal: Option<&str>, now: DateTime<Utc>) -> MarketState {
    signal
        .map(MarketState::from_signal)
        .unwrap_or_else(|| market_hours::session_at(now))
}

fn unix_seconds(ts: i64) -> Option<DateTime<Utc>> {
    if ts <= 0 {
        return None;
    }
    Utc.timestamp_opt(ts, 0).single()
}

fn as_volume(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0).then_some(v as u64)
}

fn normalize_chart(
    chart: &ChartPayload,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<QuoteRecord, ProviderError> {
    let provider = ProviderKind::Primary;
    let meta = &chart.meta;
    let quote = chart
        .indicators
        .as_ref()
        .and_then(|inds| inds.quote.first());
    let closes: Vec<f64> = quote
        .map(|q| q.close.iter().flatten().copied().collect())
        .unwrap_or_default();

    let price = meta
        .regular_market_price
        .ok_or(ProviderError::DataFormat {
            provider,
            field: "regularMarketPrice",
        })?;

    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .or_else(|| closes.len().checked_sub(2).map(|i| closes[i]))
        .ok_or(ProviderError::DataFormat {
            provider,
            field: "previousClose",
        })?;

    let volume = meta.regular_market_volume.and_then(as_volume).or_else(|| {
        quote
            .and_then(|q| q.volume.iter().rev().flatten().next().copied())
            .and_then(as_volume)
    });

    let mut history = Vec::new();
    if let (Some(timestamps), Some(q)) = (chart.timestamp.as_ref(), quote) {
        for (i, ts) in timestamps.iter().enumerate() {
            let Some(close) = q.close.get(i).copied().flatten() else {
                continue;
            };
            let Some(timestamp) = unix_seconds(*ts) else {
                continue;
            };
            let column = |values: &[Option<f64>]| values.get(i).copied().flatten().unwrap_or(close);
            history.push(Candle {
                timestamp,
                open: column(q.open.as_slice()),
                high: column(q.high.as_slice()),
                low: column(q.low.as_slice()),
                close,
                volume: q.volume.get(i).copied().flatten().and_then(as_volume),
            });
        }
    }

    Ok(build_record(
        symbol,
        provider,
        Fields {
            price,
            previous_close,
            volume,
            market_state: market_state(meta.market_state.as_deref(), now),
            as_of: meta.regular_market_time.and_then(unix_seconds).unwrap_or(now),
            currency: meta.currency.clone(),
            history,
        },
    ))
}

fn normalize_finnhub(
    payload: &FinnhubPayload,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<QuoteRecord, ProviderError> {
    let provider = ProviderKind::BackupA;
    let quote = &payload.quote;
    let price = quote.c.ok_or(ProviderError::DataFormat {
        provider,
        field: "c",
    })?;
    let previous_close = quote.pc.ok_or(ProviderError::DataFormat {
        provider,
        field: "pc",
    })?;

    let history = match &payload.candles {
        Some(candles) if candles.s == "ok" => candles
            .t
            .iter()
            .zip(&candles.c)
            .enumerate()
            .filter_map(|(i, (ts, close))| {
                Some(Candle {
                    timestamp: unix_seconds(*ts)?,
                    open: candles.o.get(i).copied().unwrap_or(*close),
                    high: candles.h.get(i).copied().unwrap_or(*close),
                    low: candles.l.get(i).copied().unwrap_or(*close),
                    close: *close,
                    volume: candles.v.get(i).copied().and_then(as_volume),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(build_record(
        symbol,
        provider,
        Fields {
            price,
            previous_close,
            volume: quote.v.and_then(as_volume),
            market_state: market_state(None, now),
            as_of: quote.t.and_then(unix_seconds).unwrap_or(now),
            currency: None,
            history,
        },
    ))
}

fn normalize_flexible(
    quote: &FlexibleQuote,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<QuoteRecord, ProviderError> {
    let provider = ProviderKind::BackupB;
    let price = quote.price.ok_or(ProviderError::DataFormat {
        provider,
        field: "price",
    })?;
    let previous_close = quote.previous_close.ok_or(ProviderError::DataFormat {
        provider,
        field: "previousClose",
    })?;

    Ok(build_record(
        symbol,
        provider,
        Fields {
            price,
            previous_close,
            volume: quote.volume.and_then(as_volume),
            market_state: market_state(quote.market_state.as_deref(), now),
            as_of: quote.timestamp.and_then(unix_seconds).unwrap_or(now),
            currency: None,
            history: Vec::new(),
        },
    ))
}
