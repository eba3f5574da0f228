pub mod cli;
pub mod context;
pub mod core;
pub mod ledger;
pub mod orchestrator;
pub mod preferences;
pub mod providers;
pub mod relay;
pub mod server;
pub mod service;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::quote::{ProviderKind, QuoteRequest, SourcePreference};
use crate::preferences::Preferences;
use crate::service::QuoteService;
use crate::store::{DiskStore, KeyValueStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub use crate::core::error::FetchError;
pub use crate::core::quote::{QuoteRecord, QuoteResult};

pub enum AppCommand {
    Quote {
        symbols: Vec<String>,
        range: String,
        interval: Option<String>,
        history: bool,
    },
    Stats {
        hours: i64,
    },
    SetSource(SourcePreference),
    SetKey {
        provider: ProviderKind,
        key: String,
    },
    Serve {
        port: u16,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(execution = ?config.execution, relays = config.relays.len(), "Loaded config");

    let data_path = config.data_path()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(DiskStore::open(&data_path.join("store"))?);

    match command {
        AppCommand::SetSource(preference) => {
            Preferences::new(store)
                .set_preferred_source(preference)
                .await?;
            info!("Preferred source set to {preference}");
            Ok(())
        }
        AppCommand::SetKey { provider, key } => {
            Preferences::new(store).set_api_key(provider, &key).await?;
            if key.trim().is_empty() {
                info!("Cleared API key for {provider}");
            } else {
                info!("Saved API key for {provider}");
            }
            Ok(())
        }
        AppCommand::Quote {
            symbols,
            range,
            interval,
            history,
        } => {
            let service = QuoteService::from_config(&config, store).await?;
            let requests = symbols
                .iter()
                .map(|symbol| {
                    let request = match &interval {
                        Some(interval) => QuoteRequest::new(symbol, interval, &range),
                        None => QuoteRequest::for_range(symbol, &range),
                    };
                    request.prioritize_primary(history)
                })
                .collect();
            cli::quote::run(&service, requests, history).await
        }
        AppCommand::Stats { hours } => {
            let service = QuoteService::from_config(&config, store).await?;
            cli::stats::run(&service, hours).await
        }
        AppCommand::Serve { port } => {
            let service = QuoteService::from_config(&config, store).await?;
            server::serve(service, port).await
        }
    }
}
