//! Shared per-process retrieval state: relay rotation, payload cache and request ledger.

use crate::core::cache::TtlCache;
use crate::core::payload::ProviderPayload;
use crate::core::quote::{ProviderKind, QuoteRequest};
use crate::ledger::RequestLedger;
use crate::relay::{RelaySelector, RetryPolicy};
use crate::store::MemoryStore;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub interval: String,
    pub range: String,
    pub provider: ProviderKind,
    /// Prioritized requests want history, which backup payloads only carry when asked for it.
    pub prioritize_primary: bool,
}

impl CacheKey {
    pub fn new(request: &QuoteRequest, provider: ProviderKind) -> Self {
        CacheKey {
            symbol: request.symbol.clone(),
            interval: request.interval.clone(),
            range: request.range.clone(),
            provider,
            prioritize_primary: request.prioritize_primary,
        }
    }
}

pub struct RetrievalContext {
    pub selector: RelaySelector,
    pub cache: TtlCache<CacheKey, ProviderPayload>,
    pub ledger: RequestLedger,
    pub retry: RetryPolicy,
}

impl RetrievalContext {
    pub fn new(
        selector: RelaySelector,
        cache: TtlCache<CacheKey, ProviderPayload>,
        ledger: RequestLedger,
    ) -> Self {
        RetrievalContext {
            selector,
            cache,
            ledger,
            retry: RetryPolicy::exhaustive(),
        }
    }

    /// Context whose ledger lives only in memory, with default cache limits.
    pub async fn in_memory(selector: RelaySelector) -> Self {
        let ledger = RequestLedger::load(Arc::new(MemoryStore::new())).await;
        Self::new(selector, TtlCache::new(), ledger)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
