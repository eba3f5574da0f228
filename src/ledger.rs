//! Rolling success/failure history used to report a recent success rate.

use crate::store::KeyValueStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const HISTORY_KEY: &str = "request_history";
const RETENTION_DAYS: i64 = 7;
const MAX_ENTRIES: usize = 1000;

/// Stored as a `[timestamp_millis, success]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, bool)", into = "(i64, bool)")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl From<(i64, bool)> for HistoryEntry {
    fn from((millis, success): (i64, bool)) -> Self {
        HistoryEntry {
            timestamp: Utc
                .timestamp_millis_opt(millis)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            success,
        }
    }
}

impl From<HistoryEntry> for (i64, bool) {
    fn from(entry: HistoryEntry) -> Self {
        (entry.timestamp.timestamp_millis(), entry.success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SuccessRate {
    /// Percentage in 0..=100, rounded to two decimals.
    pub rate: f64,
    pub total: usize,
    pub successful: usize,
}

pub struct RequestLedger {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl RequestLedger {
    /// Reads any previously persisted history; unreadable history starts empty.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = match store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable request history");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read request history");
                Vec::new()
            }
        };
        debug!(entries = entries.len(), "Loaded request history");

        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    pub async fn record(&self, success: bool) {
        self.record_at(Utc::now(), success).await
    }

    pub async fn record_at(&self, now: DateTime<Utc>, success: bool) {
        let mut entries = self.entries.lock().await;
        entries.push(HistoryEntry {
            timestamp: now,
            success,
        });

        let cutoff = now - Duration::days(RETENTION_DAYS);
        entries.retain(|entry| entry.timestamp > cutoff);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }

        match serde_json::to_string(&*entries) {
            Ok(raw) => {
                if let Err(e) = self.store.set(HISTORY_KEY, &raw).await {
                    warn!(error = %e, "Failed to persist request history");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode request history"),
        }
    }

    pub async fn compute_rate(&self, window_hours: i64) -> SuccessRate {
        self.compute_rate_at(Utc::now(), window_hours).await
    }

    pub async fn compute_rate_at(&self, now: DateTime<Utc>, window_hours: i64) -> SuccessRate {
        let cutoff = now - Duration::hours(window_hours);
        let entries = self.entries.lock().await;
        let (total, successful) = entries
            .iter()
            .filter(|entry| entry.timestamp > cutoff)
            .fold((0, 0), |(total, ok), entry| {
                (total + 1, ok + usize::from(entry.success))
            });

        if total == 0 {
            return SuccessRate {
                rate: 100.0,
                total: 0,
                successful: 0,
            };
        }

        let rate = successful as f64 / total as f64 * 100.0;
        SuccessRate {
            rate: (rate * 100.0).round() / 100.0,
            total,
            successful,
        }
    }

    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn empty_ledger() -> (Arc<MemoryStore>, RequestLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = RequestLedger::load(store.clone()).await;
        (store, ledger)
    }

    #[tokio::test]
    async fn test_empty_window_reports_full_rate() {
        let (_, ledger) = empty_ledger().await;
        let rate = ledger.compute_rate(24).await;
        assert_eq!(rate.rate, 100.0);
        assert_eq!(rate.total, 0);
        assert_eq!(rate.successful, 0);
    }

    #[tokio::test]
    async fn test_rate_over_mixed_outcomes() {
        let (_, ledger) = empty_ledger().await;
        let now = Utc::now();
        ledger.record_at(now - Duration::hours(3), true).await;
        ledger.record_at(now - Duration::hours(2), false).await;
        ledger.record_at(now - Duration::hours(1), true).await;

        let rate = ledger.compute_rate_at(now, 24).await;
        assert_eq!(rate.total, 3);
        assert_eq!(rate.successful, 2);
        assert!((rate.rate - 66.67).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_window_excludes_older_entries() {
        let (_, ledger) = empty_ledger().await;
        let now = Utc::now();
        ledger.record_at(now - Duration::hours(30), false).await;
        ledger.record_at(now - Duration::hours(1), true).await;

        let rate = ledger.compute_rate_at(now, 24).await;
        assert_eq!(rate.total, 1);
        assert_eq!(rate.rate, 100.0);
        assert_eq!(ledger.compute_rate_at(now, 48).await.total, 2);
    }

    #[tokio::test]
    async fn test_entries_older_than_retention_are_pruned_on_write() {
        let (_, ledger) = empty_ledger().await;
        let now = Utc::now();
        ledger.record_at(now - Duration::days(8), true).await;
        ledger.record_at(now, false).await;

        let entries = ledger.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn test_history_is_capped_oldest_first() {
        let (_, ledger) = empty_ledger().await;
        let start = Utc::now() - Duration::hours(1);
        for i in 0..(MAX_ENTRIES as i64 + 5) {
            ledger.record_at(start + Duration::seconds(i), i % 2 == 0).await;
        }

        let entries = ledger.entries().await;
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].timestamp, start + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_history_is_persisted_and_reloaded() {
        let (store, ledger) = empty_ledger().await;
        let now = Utc::now();
        ledger.record_at(now, true).await;

        let raw = store.get(HISTORY_KEY).await.unwrap().unwrap();
        assert_eq!(raw, format!("[[{},true]]", now.timestamp_millis()));

        let reloaded = RequestLedger::load(store).await;
        assert_eq!(reloaded.entries().await.len(), 1);
        assert_eq!(reloaded.compute_rate_at(now, 24).await.successful, 1);
    }

    #[tokio::test]
    async fn test_corrupt_history_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "not json").await.unwrap();
        let ledger = RequestLedger::load(store).await;
        assert!(ledger.entries().await.is_empty());
    }
}
