use super::QuoteSource;
use super::util::{fetch_text, parse_json};
use crate::context::RetrievalContext;
use crate::core::error::ProviderError;
use crate::core::payload::{FlexibleQuote, ProviderPayload};
use crate::core::quote::{ProviderKind, QuoteRequest};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

const PROVIDER: ProviderKind = ProviderKind::BackupB;

const PRICE_KEYS: [&str; 4] = ["c", "close", "price", "last"];
const PREVIOUS_CLOSE_KEYS: [&str; 4] = ["pc", "previousClose", "prevClose", "prev_close"];
const VOLUME_KEYS: [&str; 2] = ["v", "volume"];
const TIMESTAMP_KEYS: [&str; 3] = ["t", "updated", "timestamp"];

/// A field may arrive as a number, a numeric string, or a one-element array.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.first().and_then(as_number),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(as_text),
        _ => None,
    }
}

fn pick_number(body: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| body.get(*key).and_then(as_number))
}

/// Reconciles the provider's loosely-named fields into a [`FlexibleQuote`].
pub fn reconcile(body: &Value) -> FlexibleQuote {
    FlexibleQuote {
        price: pick_number(body, &PRICE_KEYS),
        previous_close: pick_number(body, &PREVIOUS_CLOSE_KEYS),
        volume: pick_number(body, &VOLUME_KEYS),
        timestamp: pick_number(body, &TIMESTAMP_KEYS).map(|t| t as i64),
        market_state: body.get("marketState").and_then(as_text),
    }
}

/// Client for the bearer-token backup provider. Calls are not bounded by a client-side timeout.
pub struct BearerQuoteClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BearerQuoteClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("quotefeed/0.1")
            .build()?;
        Ok(BearerQuoteClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for BearerQuoteClient {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(name = "BearerQuoteFetch", skip(self, request, _ctx), fields(symbol = %request.symbol))]
    async fn fetch(
        &self,
        request: &QuoteRequest,
        _ctx: &RetrievalContext,
    ) -> Result<ProviderPayload, ProviderError> {
        let invalid = || ProviderError::InvalidSymbol {
            provider: PROVIDER,
            symbol: request.symbol.clone(),
        };

        let url = format!(
            "{}/v1/stocks/quotes/{}/",
            self.base_url,
            urlencoding::encode(&request.symbol)
        );
        let body = match fetch_text(PROVIDER, self.client.get(&url).bearer_auth(&self.api_key), None)
            .await
        {
            Ok(body) => body,
            Err(ProviderError::HttpStatus { status: 404, .. }) => return Err(invalid()),
            Err(e) => return Err(e),
        };

        let value = parse_json(PROVIDER, &body)?;
        if let Some("error" | "no_data") = value.get("s").and_then(Value::as_str) {
            return Err(invalid());
        }

        Ok(ProviderPayload::Flexible(reconcile(&value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelaySelector;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_reconcile_array_shape() {
        let body = json!({
            "s": "ok",
            "last": [190.5],
            "prevClose": [188.0],
            "volume": [52_000_000],
            "updated": [1700000000]
        });
        assert_eq!(
            reconcile(&body),
            FlexibleQuote {
                price: Some(190.5),
                previous_close: Some(188.0),
                volume: Some(52_000_000.0),
                timestamp: Some(1700000000),
                market_state: None,
            }
        );
    }

    #[test]
    fn test_reconcile_scalar_and_string_shapes() {
        let body = json!({ "c": "101.25", "pc": 100, "marketState": "POST" });
        let quote = reconcile(&body);
        assert_eq!(quote.price, Some(101.25));
        assert_eq!(quote.previous_close, Some(100.0));
        assert_eq!(quote.market_state.as_deref(), Some("POST"));
        assert!(quote.volume.is_none());
    }

    #[test]
    fn test_reconcile_prefers_earlier_keys() {
        let body = json!({ "price": 5.0, "c": 6.0 });
        assert_eq!(reconcile(&body).price, Some(6.0));
    }

    #[test_log::test(tokio::test)]
    async fn test_fetch_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/stocks/quotes/AAPL/"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "s": "ok", "last": [190.5], "prevClose": [188.0]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = RetrievalContext::in_memory(RelaySelector::default()).await;
        let client = BearerQuoteClient::new(&server.uri(), "secret").unwrap();
        let payload = client.fetch(&QuoteRequest::new("AAPL", "1d", "1d"), &ctx).await.unwrap();
        assert!(matches!(payload, ProviderPayload::Flexible(FlexibleQuote { price: Some(p), .. }) if p == 190.5));
    }

    #[test_log::test(tokio::test)]
    async fn test_no_data_is_invalid_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "s": "no_data" })))
            .mount(&server)
            .await;

        let ctx = RetrievalContext::in_memory(RelaySelector::default()).await;
        let client = BearerQuoteClient::new(&server.uri(), "secret").unwrap();
        let err = client.fetch(&QuoteRequest::new("ZZZZ", "1d", "1d"), &ctx).await.unwrap_err();
        assert!(err.is_invalid_symbol());
    }
}
