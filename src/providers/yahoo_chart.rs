use super::QuoteSource;
use super::util::{fetch_text, parse_json, unwrap_envelope};
use crate::context::RetrievalContext;
use crate::core::config::ExecutionContext;
use crate::core::error::ProviderError;
use crate::core::payload::{ChartPayload, ChartResponse, ProviderPayload};
use crate::core::quote::{ProviderKind, QuoteRequest};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PROVIDER: ProviderKind = ProviderKind::Primary;
const NOT_FOUND_CODE: &str = "Not Found";

/// Client for the primary chart API.
///
/// Direct execution rotates across the upstream hosts; relayed execution walks
/// every relay × upstream pair starting from the last one that worked.
pub struct YahooChartClient {
    client: reqwest::Client,
    execution: ExecutionContext,
    timeout: Duration,
}

impl YahooChartClient {
    pub fn new(execution: ExecutionContext, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("quotefeed/0.1")
            .build()?;
        Ok(YahooChartClient {
            client,
            execution,
            timeout,
        })
    }

    fn chart_path(request: &QuoteRequest) -> String {
        format!(
            "/v8/finance/chart/{}?interval={}&range={}",
            urlencoding::encode(&request.symbol),
            urlencoding::encode(&request.interval),
            urlencoding::encode(&request.range)
        )
    }

    async fn attempt(
        &self,
        request: RequestBuilder,
        symbol: &str,
    ) -> Result<ChartPayload, ProviderError> {
        let body = match fetch_text(PROVIDER, request, Some(self.timeout)).await {
            Ok(body) => body,
            // Relays answer 404 for their own reasons; only trust it from the upstream.
            Err(ProviderError::HttpStatus { status: 404, .. }) if self.execution.is_direct() => {
                return Err(ProviderError::InvalidSymbol {
                    provider: PROVIDER,
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let value = unwrap_envelope(PROVIDER, parse_json(PROVIDER, &body)?)?;
        let response: ChartResponse =
            serde_json::from_value(value).map_err(|e| ProviderError::malformed(PROVIDER, e))?;

        if let Some(error) = response.chart.error {
            if error.code == NOT_FOUND_CODE {
                return Err(ProviderError::InvalidSymbol {
                    provider: PROVIDER,
                    symbol: symbol.to_string(),
                });
            }
            return Err(ProviderError::malformed(
                PROVIDER,
                error.description.unwrap_or(error.code),
            ));
        }

        response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "empty chart result"))
    }

    async fn fetch_direct(
        &self,
        request: &QuoteRequest,
        ctx: &RetrievalContext,
    ) -> Result<ChartPayload, ProviderError> {
        let path = Self::chart_path(request);
        let mut attempts = 0;
        let mut last = None;

        for upstream in ctx.selector.direct_plan(&ctx.retry) {
            attempts += 1;
            let url = format!(
                "{}{}",
                ctx.selector.upstream(upstream).trim_end_matches('/'),
                path
            );
            debug!(%url, "Requesting chart");

            match self.attempt(self.client.get(&url), &request.symbol).await {
                Ok(payload) => {
                    ctx.selector.record_upstream_success(upstream);
                    return Ok(payload);
                }
                Err(e) if e.is_invalid_symbol() => return Err(e),
                Err(e) => {
                    warn!(%url, error = %e, "Chart request failed");
                    last = Some(e);
                }
            }
        }

        Err(exhausted(attempts, last))
    }

    async fn fetch_relayed(
        &self,
        request: &QuoteRequest,
        ctx: &RetrievalContext,
    ) -> Result<ChartPayload, ProviderError> {
        let path = Self::chart_path(request);
        let mut attempts = 0;
        let mut last = None;

        for pair in ctx.selector.plan(&ctx.retry) {
            attempts += 1;
            let relay = ctx.selector.relay(pair.relay);
            let target = format!(
                "{}{}",
                ctx.selector.upstream(pair.upstream).trim_end_matches('/'),
                path
            );
            let url = relay.wrap(&target);
            debug!(relay = %relay.name, %url, "Requesting chart through relay");

            let mut builder = self.client.get(&url);
            for (name, value) in &relay.headers {
                builder = builder.header(name, value);
            }

            match self.attempt(builder, &request.symbol).await {
                Ok(payload) => {
                    ctx.selector.record_success(pair);
                    return Ok(payload);
                }
                Err(e) if e.is_invalid_symbol() => return Err(e),
                Err(e) => {
                    warn!(relay = %relay.name, error = %e, "Relay attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(exhausted(attempts, last))
    }
}

fn exhausted(attempts: usize, last: Option<ProviderError>) -> ProviderError {
    match last {
        Some(last) => ProviderError::AttemptsExhausted {
            provider: PROVIDER,
            attempts,
            last: Box::new(last),
        },
        None => ProviderError::Transport {
            provider: PROVIDER,
            message: "no endpoints configured".to_string(),
        },
    }
}

#[async_trait]
impl QuoteSource for YahooChartClient {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(
        name = "ChartFetch",
        skip(self, request, ctx),
        fields(symbol = %request.symbol, execution = ?self.execution)
    )]
    async fn fetch(
        &self,
        request: &QuoteRequest,
        ctx: &RetrievalContext,
    ) -> Result<ProviderPayload, ProviderError> {
        let payload = if self.execution.is_direct() {
            self.fetch_direct(request, ctx).await?
        } else {
            self.fetch_relayed(request, ctx).await?
        };
        Ok(ProviderPayload::Chart(payload))
    }
}
