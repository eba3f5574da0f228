//! Typed access to user preferences held in the host's key-value store.

use crate::core::quote::{ProviderKind, SourcePreference};
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

pub const PREFERRED_SOURCE_KEY: &str = "preferred_source";

fn api_key_name(provider: ProviderKind) -> String {
    format!("api_key.{provider}")
}

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Unreadable or unknown values read as `auto`.
    pub async fn preferred_source(&self) -> SourcePreference {
        match self.store.get(PREFERRED_SOURCE_KEY).await {
            Ok(Some(value)) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring stored source preference");
                SourcePreference::Auto
            }),
            Ok(None) => SourcePreference::Auto,
            Err(e) => {
                warn!(error = %e, "Failed to read source preference");
                SourcePreference::Auto
            }
        }
    }

    pub async fn set_preferred_source(&self, preference: SourcePreference) -> Result<()> {
        self.store
            .set(PREFERRED_SOURCE_KEY, &preference.to_string())
            .await
    }

    pub async fn api_key(&self, provider: ProviderKind) -> Option<String> {
        match self.store.get(&api_key_name(provider)).await {
            Ok(key) => key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, %provider, "Failed to read API key");
                None
            }
        }
    }

    /// A blank key clears the stored one.
    pub async fn set_api_key(&self, provider: ProviderKind, key: &str) -> Result<()> {
        let name = api_key_name(provider);
        match key.trim() {
            "" => self.store.remove(&name).await,
            key => self.store.set(&name, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_preferred_source_defaults_to_auto() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert_eq!(prefs.preferred_source().await, SourcePreference::Auto);
    }

    #[tokio::test]
    async fn test_preferred_source_round_trip() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        prefs
            .set_preferred_source(SourcePreference::BackupA)
            .await
            .unwrap();
        assert_eq!(prefs.preferred_source().await, SourcePreference::BackupA);
    }

    #[tokio::test]
    async fn test_unknown_stored_preference_reads_as_auto() {
        let store = Arc::new(MemoryStore::new());
        store.set(PREFERRED_SOURCE_KEY, "finnhub").await.unwrap();
        let prefs = Preferences::new(store);
        assert_eq!(prefs.preferred_source().await, SourcePreference::Auto);
    }

    #[tokio::test]
    async fn test_api_keys_are_per_provider() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(store.clone());
        prefs
            .set_api_key(ProviderKind::BackupA, " secret ")
            .await
            .unwrap();

        assert_eq!(
            prefs.api_key(ProviderKind::BackupA).await.as_deref(),
            Some("secret")
        );
        assert!(prefs.api_key(ProviderKind::BackupB).await.is_none());
        assert_eq!(
            store.get("api_key.backupA").await.unwrap().as_deref(),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn test_blank_api_key_clears_stored_key() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(store.clone());
        prefs.set_api_key(ProviderKind::BackupB, "token").await.unwrap();
        prefs.set_api_key(ProviderKind::BackupB, "  ").await.unwrap();

        assert!(prefs.api_key(ProviderKind::BackupB).await.is_none());
        assert!(store.get("api_key.backupB").await.unwrap().is_none());
    }
}
