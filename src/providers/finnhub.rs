use super::QuoteSource;
use super::util::fetch_text;
use crate::context::RetrievalContext;
use crate::core::error::ProviderError;
use crate::core::payload::{FinnhubCandles, FinnhubPayload, FinnhubQuote, ProviderPayload};
use crate::core::quote::{ProviderKind, QuoteRequest};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PROVIDER: ProviderKind = ProviderKind::BackupA;

/// Index symbols have no quote on this provider; track them through ETFs instead.
pub fn provider_symbol(symbol: &str) -> &str {
    match symbol {
        "^GSPC" => "SPY",
        "^DJI" => "DIA",
        "^IXIC" => "QQQ",
        "^RUT" => "IWM",
        "^VIX" => "VIXY",
        other => other,
    }
}

pub fn candle_resolution(interval: &str) -> &'static str {
    match interval {
        "1m" => "1",
        "5m" => "5",
        "15m" => "15",
        "30m" => "30",
        "60m" | "1h" => "60",
        "1wk" => "W",
        "1mo" => "M",
        _ => "D",
    }
}

pub struct FinnhubClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl FinnhubClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("quotefeed/0.1")
            .build()?;
        Ok(FinnhubClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<FinnhubQuote, ProviderError> {
        let url = format!(
            "{}/api/v1/quote?symbol={}&token={}",
            self.base_url,
            urlencoding::encode(symbol),
            urlencoding::encode(&self.api_key)
        );
        let body = fetch_text(PROVIDER, self.client.get(&url), Some(self.timeout)).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::malformed(PROVIDER, e))
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        request: &QuoteRequest,
    ) -> Result<Option<FinnhubCandles>, ProviderError> {
        let (from, to) = request.history_window(Utc::now());
        let url = format!(
            "{}/api/v1/stock/candle?symbol={}&resolution={}&from={}&to={}&token={}",
            self.base_url,
            urlencoding::encode(symbol),
            candle_resolution(&request.interval),
            from.timestamp(),
            to.timestamp(),
            urlencoding::encode(&self.api_key)
        );
        let body = fetch_text(PROVIDER, self.client.get(&url), Some(self.timeout)).await?;
        let candles: FinnhubCandles =
            serde_json::from_str(&body).map_err(|e| ProviderError::malformed(PROVIDER, e))?;

        if candles.s != "ok" {
            debug!(status = %candles.s, "No candle data");
            return Ok(None);
        }
        Ok(Some(candles))
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(name = "FinnhubFetch", skip(self, request, _ctx), fields(symbol = %request.symbol))]
    async fn fetch(
        &self,
        request: &QuoteRequest,
        _ctx: &RetrievalContext,
    ) -> Result<ProviderPayload, ProviderError> {
        let symbol = provider_symbol(&request.symbol);
        let quote = self.fetch_quote(symbol).await?;
        if quote.is_all_zero() {
            return Err(ProviderError::InvalidSymbol {
                provider: PROVIDER,
                symbol: request.symbol.clone(),
            });
        }

        // History is best effort: a quote without candles is still a quote.
        let candles = if request.prioritize_primary {
            self.fetch_candles(symbol, request)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Candle request failed");
                    None
                })
        } else {
            None
        };

        Ok(ProviderPayload::Finnhub(FinnhubPayload { quote, candles }))
    }
}
