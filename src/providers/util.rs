use crate::core::error::ProviderError;
use crate::core::quote::ProviderKind;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Sends a request and reads the body as text, bounding the whole exchange by `timeout`.
///
/// Non-2xx responses are surfaced as [`ProviderError::HttpStatus`].
pub async fn fetch_text(
    provider: ProviderKind,
    request: RequestBuilder,
    timeout: Option<Duration>,
) -> Result<String, ProviderError> {
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(provider, e))?;

        let status = response.status();
        debug!(%provider, status = status.as_u16(), "Received response");
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                provider,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::transport(provider, e))
    };

    match timeout {
        Some(after) => tokio::time::timeout(after, exchange)
            .await
            .map_err(|_| ProviderError::Timeout { provider, after })?,
        None => exchange.await,
    }
}

/// Parses a JSON body, failing with [`ProviderError::MalformedResponse`].
pub fn parse_json(provider: ProviderKind, body: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::malformed(provider, e))
}

/// Some relays answer with `{"contents": "<upstream body>", ...}`; unwrap those.
pub fn unwrap_envelope(provider: ProviderKind, value: Value) -> Result<Value, ProviderError> {
    let inner = match &value {
        Value::Object(map) if !map.contains_key("chart") => match map.get("contents") {
            Some(Value::String(contents)) => Some(parse_json(provider, contents)?),
            _ => None,
        },
        _ => None,
    };
    Ok(inner.unwrap_or(value))
}
