//! Local HTTP relay: serves canonical quotes to browser clients that cannot
//! call the upstream providers themselves.

use crate::core::error::FetchError;
use crate::core::quote::{QuoteRequest, QuoteResult, default_interval};
use crate::ledger::SuccessRate;
use crate::service::QuoteService;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_PERIOD: &str = "1d";
const DEFAULT_STATS_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub period: Option<String>,
    pub interval: Option<String>,
    #[serde(default)]
    pub history: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub hours: Option<i64>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub struct ApiError(FetchError);

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            FetchError::InvalidSymbol { .. } => (StatusCode::NOT_FOUND, "invalid_symbol"),
            FetchError::AllSourcesExhausted { .. } => (StatusCode::BAD_GATEWAY, "sources_exhausted"),
            FetchError::TimedOut { .. } => (StatusCode::GATEWAY_TIMEOUT, "timed_out"),
        };
        let body = ErrorBody {
            error,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// GET /api/quote/{symbol}?period=&interval=&history=
async fn quote(
    State(service): State<QuoteService>,
    Path(symbol): Path<String>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<QuoteResult>, ApiError> {
    let period = params.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let interval = params
        .interval
        .as_deref()
        .unwrap_or_else(|| default_interval(period));
    let request = QuoteRequest::new(&symbol, interval, period).prioritize_primary(params.history);

    let result = service.fetch(&request).await?;
    Ok(Json(result))
}

/// GET /api/stats?hours=
async fn stats(
    State(service): State<QuoteService>,
    Query(params): Query<StatsParams>,
) -> Json<SuccessRate> {
    let hours = params.hours.unwrap_or(DEFAULT_STATS_HOURS);
    Json(service.success_rate(hours).await)
}

pub fn router(service: QuoteService) -> Router {
    Router::new()
        .route("/api/quote/{symbol}", get(quote))
        .route("/api/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub async fn serve(service: QuoteService, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Serving quotes on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .await
        .context("Server error")
}
