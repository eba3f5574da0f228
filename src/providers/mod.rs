//! Clients for the three quote providers.

pub mod bearer_quote;
pub mod finnhub;
pub mod util;
pub mod yahoo_chart;

use crate::context::RetrievalContext;
use crate::core::error::ProviderError;
use crate::core::payload::ProviderPayload;
use crate::core::quote::{ProviderKind, QuoteRequest};
use async_trait::async_trait;

pub use bearer_quote::BearerQuoteClient;
pub use finnhub::FinnhubClient;
pub use yahoo_chart::YahooChartClient;

/// One upstream quote source. Implementations return the raw decoded payload;
/// normalization happens in the orchestrator.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn fetch(
        &self,
        request: &QuoteRequest,
        ctx: &RetrievalContext,
    ) -> Result<ProviderPayload, ProviderError>;
}
