//! Library facade: wires configured sources, the retrieval context and preferences together.

use crate::context::RetrievalContext;
use crate::core::cache::TtlCache;
use crate::core::config::AppConfig;
use crate::core::error::{FetchError, SourceFailure};
use crate::core::quote::{ProviderKind, QuoteRequest, QuoteResult};
use crate::ledger::{RequestLedger, SuccessRate};
use crate::orchestrator::Orchestrator;
use crate::preferences::Preferences;
use crate::providers::{BearerQuoteClient, FinnhubClient, QuoteSource, YahooChartClient};
use crate::relay::RelaySelector;
use crate::store::KeyValueStore;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct QuoteService {
    orchestrator: Arc<Orchestrator>,
    context: Arc<RetrievalContext>,
    preferences: Preferences,
    batch_timeout: Duration,
}

impl QuoteService {
    pub fn new(
        orchestrator: Orchestrator,
        context: RetrievalContext,
        preferences: Preferences,
        batch_timeout: Duration,
    ) -> Self {
        QuoteService {
            orchestrator: Arc::new(orchestrator),
            context: Arc::new(context),
            preferences,
            batch_timeout,
        }
    }

    /// Builds every source that has what it needs. API keys from the config file
    /// take precedence over keys saved in preferences.
    pub async fn from_config(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let preferences = Preferences::new(Arc::clone(&store));
        let providers = &config.providers;

        let mut sources: Vec<Arc<dyn QuoteSource>> = vec![Arc::new(YahooChartClient::new(
            config.execution,
            Duration::from_secs(providers.yahoo.timeout_secs),
        )?)];

        let finnhub_key = match &providers.finnhub.api_key {
            Some(key) => Some(key.clone()),
            None => preferences.api_key(ProviderKind::BackupA).await,
        };
        match finnhub_key {
            Some(key) => sources.push(Arc::new(FinnhubClient::new(
                &providers.finnhub.base_url,
                &key,
                Duration::from_secs(providers.finnhub.timeout_secs),
            )?)),
            None => debug!("No API key for backupA; source disabled"),
        }

        let backup_b_key = match &providers.backup_b.api_key {
            Some(key) => Some(key.clone()),
            None => preferences.api_key(ProviderKind::BackupB).await,
        };
        match backup_b_key {
            Some(key) => sources.push(Arc::new(BearerQuoteClient::new(
                &providers.backup_b.base_url,
                &key,
            )?)),
            None => debug!("No API key for backupB; source disabled"),
        }

        let selector = RelaySelector::new(config.relays.clone(), providers.yahoo.base_urls.clone());
        let cache = TtlCache::with_limits(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.capacity,
        );
        let ledger = RequestLedger::load(store).await;
        info!(
            execution = ?config.execution,
            sources = sources.len(),
            "Quote service ready"
        );

        Ok(Self::new(
            Orchestrator::new(config.execution, sources),
            RetrievalContext::new(selector, cache, ledger),
            preferences,
            config.batch_timeout(),
        ))
    }

    pub async fn fetch(&self, request: &QuoteRequest) -> Result<QuoteResult, FetchError> {
        let preference = self.preferences.preferred_source().await;
        self.orchestrator
            .fetch(&self.context, request, preference)
            .await
    }

    /// Fetches every request concurrently against one shared deadline.
    ///
    /// Requests still running at the deadline report [`FetchError::TimedOut`];
    /// their tasks keep running and their results are discarded.
    pub async fn fetch_batch(
        &self,
        requests: Vec<QuoteRequest>,
    ) -> Vec<(QuoteRequest, Result<QuoteResult, FetchError>)> {
        self.fetch_batch_with_progress(requests, |_| {}).await
    }

    /// Same as [`QuoteService::fetch_batch`], calling `on_done` as each symbol settles.
    pub async fn fetch_batch_with_progress<F>(
        &self,
        requests: Vec<QuoteRequest>,
        on_done: F,
    ) -> Vec<(QuoteRequest, Result<QuoteResult, FetchError>)>
    where
        F: Fn(&QuoteRequest),
    {
        let deadline = Instant::now() + self.batch_timeout;
        let on_done = &on_done;

        let pending = requests.into_iter().map(|request| {
            let service = self.clone();
            let task_request = request.clone();
            let handle = tokio::spawn(async move { service.fetch(&task_request).await });

            async move {
                let result = match timeout_at(deadline, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => {
                        warn!(symbol = %request.symbol, error = %join_error, "Fetch task failed");
                        Err(task_failure(&request.symbol, &join_error))
                    }
                    Err(_) => {
                        warn!(symbol = %request.symbol, "Batch deadline reached");
                        Err(FetchError::TimedOut {
                            symbol: request.symbol.clone(),
                        })
                    }
                };
                on_done(&request);
                (request, result)
            }
        });

        join_all(pending).await
    }

    pub async fn success_rate(&self, window_hours: i64) -> SuccessRate {
        self.context.ledger.compute_rate(window_hours).await
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

/// A fetch task that died never reached any source; every provider gets the same reason.
fn task_failure(symbol: &str, join_error: &JoinError) -> FetchError {
    FetchError::AllSourcesExhausted {
        symbol: symbol.to_string(),
        reasons: ProviderKind::ALL
            .iter()
            .map(|provider| SourceFailure {
                provider: *provider,
                reason: format!("fetch task failed: {join_error}"),
            })
            .collect(),
    }
}
