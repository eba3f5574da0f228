//! Ordered fallback across the configured quote sources.

use crate::context::{CacheKey, RetrievalContext};
use crate::core::config::ExecutionContext;
use crate::core::error::{FetchError, ProviderError, SourceFailure};
use crate::core::normalize::normalize;
use crate::core::quote::{ProviderKind, QuoteRequest, QuoteResult, SourcePreference};
use crate::providers::QuoteSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Providers to try for one request, most preferred first, without duplicates.
pub fn candidate_order(
    execution: ExecutionContext,
    preference: SourcePreference,
    prioritize_primary: bool,
) -> Vec<ProviderKind> {
    let mut order = Vec::with_capacity(ProviderKind::ALL.len() + 2);
    if prioritize_primary {
        order.push(ProviderKind::Primary);
    }
    if execution.is_direct() {
        order.push(ProviderKind::Primary);
    }
    if let Some(pinned) = preference.provider() {
        order.push(pinned);
    }
    order.push(ProviderKind::BackupA);
    order.push(ProviderKind::Primary);
    if execution.is_direct() {
        order.push(ProviderKind::BackupB);
    }

    let mut seen = Vec::with_capacity(order.len());
    order.retain(|kind| {
        if seen.contains(kind) {
            false
        } else {
            seen.push(*kind);
            true
        }
    });
    order
}

pub struct Orchestrator {
    execution: ExecutionContext,
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl Orchestrator {
    pub fn new(execution: ExecutionContext, sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Orchestrator { execution, sources }
    }

    fn source(&self, kind: ProviderKind) -> Option<&Arc<dyn QuoteSource>> {
        self.sources.iter().find(|source| source.kind() == kind)
    }

    /// Candidate order restricted to sources that are actually configured.
    pub fn resolve_order(
        &self,
        request: &QuoteRequest,
        preference: SourcePreference,
    ) -> Vec<Arc<dyn QuoteSource>> {
        candidate_order(self.execution, preference, request.prioritize_primary)
            .into_iter()
            .filter_map(|kind| self.source(kind).cloned())
            .collect()
    }

    fn skipped_reason(&self, kind: ProviderKind) -> &'static str {
        if self.source(kind).is_none() {
            "skipped: not configured"
        } else if kind == ProviderKind::BackupB && !self.execution.is_direct() {
            "skipped: requires direct execution"
        } else {
            "skipped"
        }
    }

    #[instrument(name = "QuoteFetch", skip(self, ctx, request), fields(symbol = %request.symbol))]
    pub async fn fetch(
        &self,
        ctx: &RetrievalContext,
        request: &QuoteRequest,
        preference: SourcePreference,
    ) -> Result<QuoteResult, FetchError> {
        let order = self.resolve_order(request, preference);

        // A prioritized request must reach the primary before any backup, cached or live.
        let precheck = if request.prioritize_primary {
            order.len().min(1)
        } else {
            order.len()
        };
        let now = Utc::now();
        for source in &order[..precheck] {
            if let Some(result) = cached(ctx, request, source.kind(), now).await {
                return Ok(result);
            }
        }

        let mut failures: Vec<ProviderError> = Vec::new();
        for (position, source) in order.iter().enumerate() {
            let kind = source.kind();
            if position >= precheck {
                if let Some(result) = cached(ctx, request, kind, Utc::now()).await {
                    ctx.ledger.record(true).await;
                    return Ok(result);
                }
            }

            let outcome = match source.fetch(request, ctx).await {
                Ok(payload) => normalize(&payload, &request.symbol, Utc::now())
                    .map(|record| (payload, record)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok((payload, record)) => {
                    info!(provider = %kind, price = record.price, "Quote retrieved");
                    ctx.cache.set(CacheKey::new(request, kind), payload).await;
                    ctx.ledger.record(true).await;
                    return Ok(record.into());
                }
                Err(e) => {
                    warn!(provider = %kind, error = %e, "Source failed, falling back");
                    failures.push(e);
                }
            }
        }

        ctx.ledger.record(false).await;

        if !failures.is_empty() && failures.iter().all(ProviderError::is_invalid_symbol) {
            return Err(FetchError::InvalidSymbol {
                symbol: request.symbol.clone(),
            });
        }

        let attempted: Vec<ProviderKind> = order.iter().map(|source| source.kind()).collect();
        let mut reasons: Vec<SourceFailure> = failures.iter().map(SourceFailure::from).collect();
        reasons.extend(
            ProviderKind::ALL
                .iter()
                .filter(|kind| !attempted.contains(*kind))
                .map(|kind| SourceFailure {
                    provider: *kind,
                    reason: self.skipped_reason(*kind).to_string(),
                }),
        );

        Err(FetchError::AllSourcesExhausted {
            symbol: request.symbol.clone(),
            reasons,
        })
    }
}

async fn cached(
    ctx: &RetrievalContext,
    request: &QuoteRequest,
    kind: ProviderKind,
    now: DateTime<Utc>,
) -> Option<QuoteResult> {
    let payload = ctx.cache.get(&CacheKey::new(request, kind)).await?;
    match normalize(&payload, &request.symbol, now) {
        Ok(record) => {
            debug!(provider = %kind, "Serving cached quote");
            Some(record.into())
        }
        Err(e) => {
            warn!(provider = %kind, error = %e, "Cached payload no longer normalizes");
            None
        }
    }
}
