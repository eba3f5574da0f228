//! Error taxonomy for quote retrieval.
//!
//! [`ProviderError`] describes a single failed attempt against one provider and
//! never leaves the orchestrator. [`FetchError`] is what callers see.

use crate::core::quote::ProviderKind;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("timed out after {after:?}")]
    Timeout {
        provider: ProviderKind,
        after: Duration,
    },

    #[error("HTTP error: {status}")]
    HttpStatus { provider: ProviderKind, status: u16 },

    #[error("malformed response: {message}")]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("invalid symbol: {symbol}")]
    InvalidSymbol {
        provider: ProviderKind,
        symbol: String,
    },

    #[error("request error: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    /// A required price field was null or missing once the payload was decoded.
    #[error("missing required field `{field}`")]
    DataFormat {
        provider: ProviderKind,
        field: &'static str,
    },

    /// Every endpoint in the rotation plan failed.
    #[error("all {attempts} attempts failed; last: {last}")]
    AttemptsExhausted {
        provider: ProviderKind,
        attempts: usize,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Timeout { provider, .. }
            | Self::HttpStatus { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::InvalidSymbol { provider, .. }
            | Self::Transport { provider, .. }
            | Self::DataFormat { provider, .. }
            | Self::AttemptsExhausted { provider, .. } => *provider,
        }
    }

    pub fn is_invalid_symbol(&self) -> bool {
        match self {
            Self::InvalidSymbol { .. } => true,
            Self::AttemptsExhausted { last, .. } => last.is_invalid_symbol(),
            _ => false,
        }
    }

    pub(crate) fn malformed(provider: ProviderKind, message: impl Display) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.to_string(),
        }
    }

    pub(crate) fn transport(provider: ProviderKind, err: reqwest::Error) -> Self {
        Self::Transport {
            provider,
            message: err.to_string(),
        }
    }
}

/// One labeled reason per source that did not produce a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub provider: ProviderKind,
    pub reason: String,
}

impl From<&ProviderError> for SourceFailure {
    fn from(err: &ProviderError) -> Self {
        SourceFailure {
            provider: err.provider(),
            reason: err.to_string(),
        }
    }
}

impl Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn join_reasons(reasons: &[SourceFailure]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("All sources exhausted for {symbol}: {}", join_reasons(.reasons))]
    AllSourcesExhausted {
        symbol: String,
        reasons: Vec<SourceFailure>,
    },

    #[error("Invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    /// The batch deadline passed before this symbol's fetch completed.
    #[error("Timed out waiting for {symbol}")]
    TimedOut { symbol: String },
}
