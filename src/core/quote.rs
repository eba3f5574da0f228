//! Canonical quote types shared by every provider

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Identity of an upstream data provider. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "backupA")]
    BackupA,
    #[serde(rename = "backupB")]
    BackupB,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Primary,
        ProviderKind::BackupA,
        ProviderKind::BackupB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Primary => "primary",
            ProviderKind::BackupA => "backupA",
            ProviderKind::BackupB => "backupB",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(ProviderKind::Primary),
            "backupa" | "backup_a" => Ok(ProviderKind::BackupA),
            "backupb" | "backup_b" => Ok(ProviderKind::BackupB),
            _ => Err(anyhow::anyhow!("Invalid provider: {}", s)),
        }
    }
}

/// The user's preferred source, as stored by the settings collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourcePreference {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "backupA")]
    BackupA,
    #[serde(rename = "backupB")]
    BackupB,
}

impl SourcePreference {
    /// The provider this preference pins, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            SourcePreference::Auto => None,
            SourcePreference::Primary => Some(ProviderKind::Primary),
            SourcePreference::BackupA => Some(ProviderKind::BackupA),
            SourcePreference::BackupB => Some(ProviderKind::BackupB),
        }
    }
}

impl Display for SourcePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.provider() {
            Some(kind) => f.write_str(kind.as_str()),
            None => f.write_str("auto"),
        }
    }
}

impl FromStr for SourcePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(SourcePreference::Auto);
        }
        match s.parse::<ProviderKind>()? {
            ProviderKind::Primary => Ok(SourcePreference::Primary),
            ProviderKind::BackupA => Ok(SourcePreference::BackupA),
            ProviderKind::BackupB => Ok(SourcePreference::BackupB),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketState {
    Regular,
    Pre,
    Post,
    Closed,
    Unknown,
}

impl MarketState {
    /// Maps a provider-declared session string onto the canonical states.
    pub fn from_signal(signal: &str) -> Self {
        match signal.to_uppercase().as_str() {
            "REGULAR" => MarketState::Regular,
            "PRE" | "PREPRE" => MarketState::Pre,
            "POST" | "POSTPOST" => MarketState::Post,
            "CLOSED" => MarketState::Closed,
            _ => MarketState::Unknown,
        }
    }
}

impl Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MarketState::Regular => "REGULAR",
            MarketState::Pre => "PRE",
            MarketState::Post => "POST",
            MarketState::Closed => "CLOSED",
            MarketState::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Display-only classification derived from the size of the daily move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Operational,
    Degraded,
}

impl MonitorStatus {
    const DEGRADED_THRESHOLD: f64 = 5.0;

    pub fn from_change_percent(change_percent: f64) -> Self {
        if change_percent.abs() > Self::DEGRADED_THRESHOLD {
            MonitorStatus::Degraded
        } else {
            MonitorStatus::Operational
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Provider-agnostic quote consumed by rendering code as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<u64>,
    pub market_state: MarketState,
    #[serde(rename = "sourceProvider")]
    pub source: ProviderKind,
    pub as_of: DateTime<Utc>,
    pub currency: Option<String>,
    pub status: MonitorStatus,
    #[serde(default)]
    pub history: Vec<Candle>,
}

/// Tagged result handed back to callers: the record plus the source it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub data: QuoteRecord,
    pub source: ProviderKind,
}

impl From<QuoteRecord> for QuoteResult {
    fn from(data: QuoteRecord) -> Self {
        let source = data.source;
        QuoteResult { data, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    pub symbol: String,
    pub interval: String,
    pub range: String,
    /// Set when the caller needs candle history, which only the primary provider serves fully.
    pub prioritize_primary: bool,
}

impl QuoteRequest {
    pub fn new(symbol: &str, interval: &str, range: &str) -> Self {
        QuoteRequest {
            symbol: symbol.trim().to_uppercase(),
            interval: interval.to_string(),
            range: range.to_string(),
            prioritize_primary: false,
        }
    }

    /// Builds a request whose interval is derived from the range.
    pub fn for_range(symbol: &str, range: &str) -> Self {
        Self::new(symbol, default_interval(range), range)
    }

    pub fn prioritize_primary(mut self, prioritize: bool) -> Self {
        self.prioritize_primary = prioritize;
        self
    }

    /// Start and end of the history window covered by `range`, ending at `now`.
    pub fn history_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self.range.as_str() {
            "ytd" => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now - Duration::days(365)),
            "5d" => now - Duration::days(5),
            "1mo" => now - Duration::days(30),
            "3mo" => now - Duration::days(90),
            "6mo" => now - Duration::days(180),
            "1y" => now - Duration::days(365),
            "2y" => now - Duration::days(365 * 2),
            "5y" => now - Duration::days(365 * 5),
            "10y" => now - Duration::days(365 * 10),
            "max" => now - Duration::days(365 * 30),
            _ => now - Duration::days(1),
        };
        (start, now)
    }
}

/// Bar interval used when only a range is known.
pub fn default_interval(range: &str) -> &'static str {
    match range {
        "1d" => "5m",
        "5d" => "15m",
        "1mo" | "3mo" | "6mo" => "1d",
        "1y" => "1wk",
        _ => "1d",
    }
}
