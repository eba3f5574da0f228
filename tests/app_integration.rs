use quotefeed::core::config::{AppConfig, ExecutionContext};
use quotefeed::core::quote::{MarketState, ProviderKind, QuoteRequest};
use quotefeed::service::QuoteService;
use quotefeed::store::{DiskStore, KeyValueStore, MemoryStore};
use quotefeed::{AppCommand, FetchError, run_command};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

mod test_utils {
    use serde_json::Value;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Chart endpoint that answers too slowly, expected to be hit exactly once.
    pub async fn mount_slow_chart(server: &MockServer, prefix: &str, symbol: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{prefix}/v8/finance/chart/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(server)
            .await;
    }

    pub async fn mount_chart(server: &MockServer, symbol: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    pub async fn mount_finnhub_quote(server: &MockServer, symbol: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/quote"))
            .and(query_param("symbol", symbol))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

fn config_for(server: &wiremock::MockServer, upstreams: Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();
    config.execution = ExecutionContext::Direct;
    config.providers.yahoo.base_urls = upstreams;
    config.providers.finnhub.base_url = server.uri();
    config.providers.finnhub.api_key = Some("test-key".to_string());
    config
}

#[test_log::test(tokio::test)]
async fn test_primary_timeout_falls_back_to_backup_a() {
    let server = wiremock::MockServer::start().await;
    test_utils::mount_slow_chart(&server, "", "AAPL").await;
    test_utils::mount_slow_chart(&server, "/alt", "AAPL").await;
    test_utils::mount_finnhub_quote(
        &server,
        "AAPL",
        json!({ "c": 190.5, "pc": 188.0, "h": 191.0, "l": 187.0, "o": 188.5, "t": 1700000000 }),
    )
    .await;

    let mut config = config_for(&server, vec![server.uri(), format!("{}/alt", server.uri())]);
    // Whole seconds only; the primary gets one second per upstream.
    config.providers.yahoo.timeout_secs = 1;

    let service = QuoteService::from_config(&config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();
    let result = service
        .fetch(&QuoteRequest::for_range("AAPL", "1d"))
        .await
        .unwrap();
    info!(?result, "Fetched quote");

    assert_eq!(result.source, ProviderKind::BackupA);
    assert_eq!(result.data.symbol, "AAPL");
    assert!((result.data.change - 2.5).abs() < 1e-9);
    assert!((result.data.change_percent - 1.3298).abs() < 1e-3);
    assert_eq!(format!("{:.2}", result.data.change_percent), "1.33");

    let rate = service.success_rate(24).await;
    assert_eq!(rate.total, 1);
    assert_eq!(rate.successful, 1);
    assert_eq!(rate.rate, 100.0);
}

#[test_log::test(tokio::test)]
async fn test_primary_chart_is_normalized_end_to_end() {
    let server = wiremock::MockServer::start().await;
    test_utils::mount_chart(
        &server,
        "MSFT",
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "MSFT",
                        "currency": "USD",
                        "regularMarketPrice": 150.0,
                        "chartPreviousClose": 145.0,
                        "regularMarketTime": 1700000000,
                        "marketState": "POSTPOST"
                    },
                    "timestamp": [1699913600, 1700000000],
                    "indicators": { "quote": [{
                        "open": [144.0, 146.0],
                        "high": [146.0, 151.0],
                        "low": [143.0, 145.5],
                        "close": [145.0, 150.0],
                        "volume": [900, 1000]
                    }]}
                }],
                "error": null
            }
        }),
    )
    .await;

    let config = config_for(&server, vec![server.uri()]);
    let service = QuoteService::from_config(&config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();
    let result = service
        .fetch(&QuoteRequest::new("msft", "1d", "5d").prioritize_primary(true))
        .await
        .unwrap();

    assert_eq!(result.source, ProviderKind::Primary);
    assert!((result.data.change - 5.0).abs() < 1e-9);
    assert_eq!(format!("{:.2}", result.data.change_percent), "3.45");
    assert_eq!(result.data.market_state, MarketState::Post);
    assert_eq!(result.data.currency.as_deref(), Some("USD"));
    assert_eq!(result.data.history.len(), 2);
    assert_eq!(result.data.volume, Some(1000));
}

#[test_log::test(tokio::test)]
async fn test_batch_keeps_per_symbol_outcomes() {
    let server = wiremock::MockServer::start().await;
    test_utils::mount_finnhub_quote(&server, "AAPL", json!({ "c": 190.5, "pc": 188.0 })).await;
    test_utils::mount_finnhub_quote(&server, "ZZZZ", json!({ "c": 0, "pc": 0, "h": 0, "l": 0, "o": 0 }))
        .await;

    let mut config = config_for(&server, vec![server.uri()]);
    config.execution = ExecutionContext::Relayed;
    config.relays = Vec::new();

    let service = QuoteService::from_config(&config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();
    let results = service
        .fetch_batch(vec![
            QuoteRequest::for_range("AAPL", "1d"),
            QuoteRequest::for_range("ZZZZ", "1d"),
        ])
        .await;

    assert!(results[0].1.is_ok());
    match &results[1].1 {
        Err(FetchError::AllSourcesExhausted { symbol, reasons }) => {
            assert_eq!(symbol, "ZZZZ");
            assert_eq!(reasons.len(), 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let rate = service.success_rate(24).await;
    assert_eq!(rate.total, 2);
    assert_eq!(rate.successful, 1);
    assert_eq!(rate.rate, 50.0);
}

#[test_log::test(tokio::test)]
async fn test_run_command_persists_preferences() {
    let temp_dir = tempfile::tempdir().unwrap();
    let data_dir = temp_dir.path().join("data");
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!("execution: relayed\ndata_path: \"{}\"\n", data_dir.display()),
    )
    .unwrap();
    let config_path = config_path.to_str().unwrap();

    run_command(
        AppCommand::SetSource("backupA".parse().unwrap()),
        Some(config_path),
    )
    .await
    .unwrap();
    run_command(
        AppCommand::SetKey {
            provider: ProviderKind::BackupB,
            key: "token".to_string(),
        },
        Some(config_path),
    )
    .await
    .unwrap();
    run_command(AppCommand::Stats { hours: 24 }, Some(config_path))
        .await
        .unwrap();

    let store = DiskStore::open(&data_dir.join("store")).unwrap();
    assert_eq!(
        store.get("preferred_source").await.unwrap().as_deref(),
        Some("backupA")
    );
    assert_eq!(
        store.get("api_key.backupB").await.unwrap().as_deref(),
        Some("token")
    );
    assert!(store.get("request_history").await.unwrap().is_none());
}
