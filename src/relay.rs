//! Relay endpoints and the rotation state used to reach the primary chart
//! provider from contexts that cannot call it directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub const DEFAULT_UPSTREAMS: [&str; 2] = [
    "https://query1.finance.yahoo.com",
    "https://query2.finance.yahoo.com",
];

/// A URL-rewriting forwarding service.
///
/// With `query_param` set the target is percent-encoded into that query
/// parameter; otherwise it is appended verbatim to the base URL path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEndpoint {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub query_param: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RelayEndpoint {
    pub fn query(name: &str, base_url: &str, param: &str) -> Self {
        RelayEndpoint {
            name: name.to_string(),
            base_url: base_url.to_string(),
            query_param: Some(param.to_string()),
            headers: BTreeMap::new(),
        }
    }

    pub fn path(name: &str, base_url: &str) -> Self {
        RelayEndpoint {
            name: name.to_string(),
            base_url: base_url.to_string(),
            query_param: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn wrap(&self, target: &str) -> String {
        match &self.query_param {
            Some(param) => format!(
                "{}?{}={}",
                self.base_url,
                param,
                urlencoding::encode(target)
            ),
            None => format!("{}/{}", self.base_url.trim_end_matches('/'), target),
        }
    }
}

pub fn default_relays() -> Vec<RelayEndpoint> {
    vec![
        RelayEndpoint::query("allorigins", "https://api.allorigins.win/get", "url"),
        RelayEndpoint::query("corsproxy", "https://corsproxy.io/", "url"),
        RelayEndpoint::query("codetabs", "https://api.codetabs.com/v1/proxy", "quest"),
        RelayEndpoint::path("thingproxy", "https://thingproxy.freeboard.io/fetch"),
        RelayEndpoint::path("cors-anywhere", "https://cors-anywhere.herokuapp.com")
            .with_header("X-Requested-With", "XMLHttpRequest"),
    ]
}

pub fn default_upstreams() -> Vec<String> {
    DEFAULT_UPSTREAMS.iter().map(|s| s.to_string()).collect()
}

/// Upper bound on attempts per primary-provider call. No backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    max_attempts: Option<usize>,
}

impl RetryPolicy {
    /// Try every combination once.
    pub fn exhaustive() -> Self {
        RetryPolicy { max_attempts: None }
    }

    pub fn with_max_attempts(max_attempts: usize) -> Self {
        RetryPolicy {
            max_attempts: Some(max_attempts),
        }
    }

    pub fn limit(&self, available: usize) -> usize {
        self.max_attempts.map_or(available, |max| max.min(available))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPair {
    pub relay: usize,
    pub upstream: usize,
}

/// Sticky rotation over relays × upstreams.
///
/// The preferred indices are a performance hint only: concurrent fetches may
/// overwrite each other and the last write wins.
#[derive(Debug)]
pub struct RelaySelector {
    relays: Vec<RelayEndpoint>,
    upstreams: Vec<String>,
    preferred_relay: AtomicUsize,
    preferred_upstream: AtomicUsize,
}

impl RelaySelector {
    pub fn new(relays: Vec<RelayEndpoint>, upstreams: Vec<String>) -> Self {
        RelaySelector {
            relays,
            upstreams,
            preferred_relay: AtomicUsize::new(0),
            preferred_upstream: AtomicUsize::new(0),
        }
    }

    pub fn relays(&self) -> &[RelayEndpoint] {
        &self.relays
    }

    pub fn upstreams(&self) -> &[String] {
        &self.upstreams
    }

    pub fn relay(&self, index: usize) -> &RelayEndpoint {
        &self.relays[index]
    }

    pub fn upstream(&self, index: usize) -> &str {
        &self.upstreams[index]
    }

    pub fn combinations(&self) -> usize {
        self.relays.len() * self.upstreams.len()
    }

    pub fn preferred(&self) -> RelayPair {
        RelayPair {
            relay: self.preferred_relay.load(Ordering::Relaxed),
            upstream: self.preferred_upstream.load(Ordering::Relaxed),
        }
    }

    /// Non-repeating attempt order over the cross product, starting at the
    /// last pair that worked and cycling forward with the upstream varying fastest.
    pub fn plan(&self, policy: &RetryPolicy) -> Vec<RelayPair> {
        let upstreams = self.upstreams.len();
        let total = self.combinations();
        if total == 0 {
            return Vec::new();
        }

        let preferred = self.preferred();
        let start = (preferred.relay % self.relays.len()) * upstreams + preferred.upstream % upstreams;
        (0..policy.limit(total))
            .map(|offset| {
                let index = (start + offset) % total;
                RelayPair {
                    relay: index / upstreams,
                    upstream: index % upstreams,
                }
            })
            .collect()
    }

    /// Upstream order for direct calls, starting at the last upstream that worked.
    pub fn direct_plan(&self, policy: &RetryPolicy) -> Vec<usize> {
        let total = self.upstreams.len();
        if total == 0 {
            return Vec::new();
        }
        let start = self.preferred_upstream.load(Ordering::Relaxed) % total;
        (0..policy.limit(total))
            .map(|offset| (start + offset) % total)
            .collect()
    }

    pub fn record_success(&self, pair: RelayPair) {
        debug!(
            relay = %self.relays[pair.relay].name,
            upstream = %self.upstreams[pair.upstream],
            "Remembering working relay"
        );
        self.preferred_relay.store(pair.relay, Ordering::Relaxed);
        self.preferred_upstream.store(pair.upstream, Ordering::Relaxed);
    }

    pub fn record_upstream_success(&self, upstream: usize) {
        self.preferred_upstream.store(upstream, Ordering::Relaxed);
    }
}

impl Default for RelaySelector {
    fn default() -> Self {
        Self::new(default_relays(), default_upstreams())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_query_relay_encodes_target() {
        let relay = RelayEndpoint::query("allorigins", "https://api.allorigins.win/get", "url");
        assert_eq!(
            relay.wrap("https://query1.finance.yahoo.com/v8/finance/chart/AAPL?interval=1d&range=1d"),
            "https://api.allorigins.win/get?url=https%3A%2F%2Fquery1.finance.yahoo.com%2Fv8%2Ffinance%2Fchart%2FAAPL%3Finterval%3D1d%26range%3D1d"
        );
    }

    #[test]
    fn test_path_relay_appends_target() {
        let relay = RelayEndpoint::path("thingproxy", "https://thingproxy.freeboard.io/fetch/");
        assert_eq!(
            relay.wrap("https://example.com/a?b=c"),
            "https://thingproxy.freeboard.io/fetch/https://example.com/a?b=c"
        );
    }

    #[test]
    fn test_defaults_have_five_relays_and_two_upstreams() {
        let selector = RelaySelector::default();
        assert_eq!(selector.relays().len(), 5);
        assert_eq!(selector.upstreams().len(), 2);
        assert_eq!(selector.combinations(), 10);
        assert_eq!(
            selector.relay(4).headers.get("X-Requested-With").map(String::as_str),
            Some("XMLHttpRequest")
        );
    }

    #[test]
    fn test_plan_covers_every_pair_exactly_once() {
        let selector = RelaySelector::default();
        let plan = selector.plan(&RetryPolicy::exhaustive());

        assert_eq!(plan.len(), 10);
        let unique: HashSet<(usize, usize)> = plan.iter().map(|p| (p.relay, p.upstream)).collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(plan[0], RelayPair { relay: 0, upstream: 0 });
        assert_eq!(plan[1], RelayPair { relay: 0, upstream: 1 });
        assert_eq!(plan[2], RelayPair { relay: 1, upstream: 0 });
    }

    #[test]
    fn test_plan_starts_from_last_success_and_wraps() {
        let selector = RelaySelector::default();
        selector.record_success(RelayPair { relay: 3, upstream: 1 });

        let plan = selector.plan(&RetryPolicy::exhaustive());
        assert_eq!(plan[0], RelayPair { relay: 3, upstream: 1 });
        assert_eq!(plan[1], RelayPair { relay: 4, upstream: 0 });
        assert_eq!(plan[3], RelayPair { relay: 0, upstream: 0 });
        assert_eq!(plan.len(), 10);
    }

    #[test]
    fn test_retry_policy_bounds_the_plan() {
        let selector = RelaySelector::default();
        assert_eq!(selector.plan(&RetryPolicy::with_max_attempts(3)).len(), 3);
        assert_eq!(selector.plan(&RetryPolicy::with_max_attempts(50)).len(), 10);
    }

    #[test]
    fn test_direct_plan_rotates_upstreams() {
        let selector = RelaySelector::default();
        assert_eq!(selector.direct_plan(&RetryPolicy::exhaustive()), vec![0, 1]);

        selector.record_upstream_success(1);
        assert_eq!(selector.direct_plan(&RetryPolicy::exhaustive()), vec![1, 0]);
        assert_eq!(selector.direct_plan(&RetryPolicy::with_max_attempts(1)), vec![1]);
    }

    #[test]
    fn test_empty_selector_plans_nothing() {
        let selector = RelaySelector::new(Vec::new(), default_upstreams());
        assert!(selector.plan(&RetryPolicy::exhaustive()).is_empty());
    }
}
