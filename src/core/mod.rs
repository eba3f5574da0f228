//! Core retrieval abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod market_hours;
pub mod normalize;
pub mod payload;
pub mod quote;

// Re-export main types for cleaner imports
pub use cache::TtlCache;
pub use error::{FetchError, ProviderError, SourceFailure};
pub use normalize::normalize;
pub use payload::ProviderPayload;
pub use quote::{
    Candle, MarketState, MonitorStatus, ProviderKind, QuoteRecord, QuoteRequest, QuoteResult,
    SourcePreference,
};
