/// Integration tests for the data synchronization layer
///
/// These run stores against a local HTTP server standing in for the explorer
/// backend, covering the path from request to paged view.

#[cfg(test)]
mod integration_tests {
    use super::super::*;
    use crate::error::SyncError;
    use crate::logic::conversion::Unit;
    use crate::utils::ApiPath;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Mock explorer API: serves whatever response is currently set per path
    struct MockApiServer {
        base_url: String,
        routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
        hits: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl MockApiServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let routes: Arc<Mutex<HashMap<String, (u16, String)>>> = Arc::default();
            let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

            let (routes_task, hits_task) = (Arc::clone(&routes), Arc::clone(&hits));
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else { break };
                    let routes = Arc::clone(&routes_task);
                    let hits = Arc::clone(&hits_task);
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                        *hits.lock().unwrap().entry(path.clone()).or_default() += 1;
                        let (status, body) = routes
                            .lock()
                            .unwrap()
                            .get(&path)
                            .cloned()
                            .unwrap_or((404, "{}".to_string()));

                        let response = format!(
                            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len()
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { base_url, routes, hits }
        }

        fn set(&self, path: &str, status: u16, body: Value) {
            self.routes.lock().unwrap().insert(path.to_string(), (status, body.to_string()));
        }

        fn hits(&self, path: &str) -> usize {
            self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        fn config(&self) -> DataSyncConfig {
            DataSyncConfig { api_base_url: self.base_url.clone(), poll_interval_ms: None, ..DataSyncConfig::default() }
        }
    }

    fn block_info(height: u64, id: i64) -> Value {
        json!({
            "id": id,
            "height": height,
            "avg_tx_count": 2000.0,
            "difficulty": 1.0e14,
            "block_time": 600.0,
            "timestamp": format!("2024-04-20T00:{:02}:00Z", height % 60),
            "size": 1_500_000,
            "weight": 3_990_000
        })
    }

    #[tokio::test]
    async fn test_block_info_store_over_http() {
        let server = MockApiServer::start().await;
        server.set(
            ApiPath::BLOCK_INFO,
            200,
            json!([block_info(100, 1), block_info(101, 2), block_info(100, 3)]),
        );

        let mut store: DataSyncStore<BlockInfo, u64> =
            DataSyncStoreBuilder::from_config(&server.config(), ApiPath::BLOCK_INFO).keyed().build().unwrap();

        assert!(store.start().await.unwrap().is_applied());
        let records = store.records().await;
        assert_eq!(records.iter().map(|b| b.height).collect::<Vec<_>>(), vec![100, 101]);
        // last occurrence wins
        assert_eq!(records[0].id, 3);
        assert_eq!(records[0].size_kb(), "1500.000");
        assert_eq!(server.hits(ApiPath::BLOCK_INFO), 1);
        store.stop().await;
    }

    #[tokio::test]
    async fn test_http_failure_keeps_previous_collection() {
        let server = MockApiServer::start().await;
        server.set(ApiPath::BLOCK_INFO, 200, json!([block_info(1, 1), block_info(2, 2)]));

        let store: DataSyncStore<BlockInfo, u64> =
            DataSyncStoreBuilder::from_config(&server.config(), ApiPath::BLOCK_INFO).keyed().build().unwrap();
        store.refresh().await;
        let before = store.get_page(0).await;

        server.set(ApiPath::BLOCK_INFO, 500, json!({"error": "db down"}));
        let outcome = store.refresh().await;
        assert!(matches!(outcome, FetchOutcome::Failed(SyncError::HttpStatusFailure { status: 500, .. })));
        assert_eq!(store.get_page(0).await, before);

        server.set(ApiPath::BLOCK_INFO, 200, json!([{"height": "not a block"}]));
        assert!(matches!(store.refresh().await, FetchOutcome::Failed(SyncError::ParseFailure(_))));
        assert_eq!(store.get_page(0).await, before);
        assert!(store.last_error().await.unwrap().is_parse());
    }

    #[tokio::test]
    async fn test_single_object_endpoints() {
        let server = MockApiServer::start().await;
        server.set(ApiPath::BLOCK_HEIGHT, 200, json!({"height": 840000}));
        server.set(
            &ApiPath::block(840000),
            200,
            json!({"block_info": block_info(840000, 9), "transactions": [], "inputs": [], "outputs": []}),
        );

        let mut tip: DataSyncStore<BlockHeight, u64> =
            DataSyncStoreBuilder::from_config(&server.config(), ApiPath::BLOCK_HEIGHT).keyed().build().unwrap();
        tip.start().await;
        assert_eq!(tip.records().await, vec![BlockHeight { height: 840000 }]);

        let mut detail: DataSyncStore<BlockDetail, u64> =
            DataSyncStoreBuilder::from_config(&server.config(), &ApiPath::block(840000)).keyed().build().unwrap();
        detail.start().await;
        let page = detail.current_page().await;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].block_info.height, 840000);
        assert!(page.items[0].transactions.is_empty());
    }

    #[tokio::test]
    async fn test_fee_store_with_usd_rate() {
        let server = MockApiServer::start().await;
        server.set(
            ApiPath::TRANSACTION_FEES,
            200,
            json!([{"priority": "low", "fee": 3.0}, {"priority": "high", "fee": 25.0}, {"priority": "low", "fee": 4.0}]),
        );
        server.set("/rate", 200, json!({"bitcoin": {"usd": 60000.0}}));

        let config = server.config();
        let rate_fetcher = HttpFetcher::new(config.endpoint("/rate"), config.http_timeout()).unwrap();
        let mut store: DataSyncStore<TransactionFee, String> =
            DataSyncStoreBuilder::from_config(&config, ApiPath::TRANSACTION_FEES)
                .keyed()
                .secondary_rate(RateSource::coingecko_usd(rate_fetcher))
                .build()
                .unwrap();

        store.start().await;
        let fees = store.records().await;
        assert_eq!(fees.iter().map(|f| (f.priority.as_str(), f.fee)).collect::<Vec<_>>(), vec![("low", 4.0), ("high", 25.0)]);

        assert_eq!(store.refresh_rate().await, ExchangeRate::Known(60000.0));
        assert_eq!(store.display_value(250_000, Unit::USD).await.to_string(), "$150.00");
        assert_eq!(store.search_page("HIGH", 0).await.items.len(), 1);
    }

    #[tokio::test]
    async fn test_mempool_store_keeps_every_entry() {
        let server = MockApiServer::start().await;
        server.set(ApiPath::MEMPOOL_TRANSACTIONS, 200, json!([{"size": 250}, {"size": 250}, {"size": 1200}]));

        let mut store: DataSyncStore<MempoolTransaction, u64> =
            DataSyncStoreBuilder::from_config(&server.config(), ApiPath::MEMPOOL_TRANSACTIONS)
                .key_fn(sequential_keys())
                .build()
                .unwrap();

        store.start().await;
        assert_eq!(store.len().await, 3);
        store.refresh().await;
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = DataSyncConfig {
            api_base_url: format!("http://{}", listener.local_addr().unwrap()),
            poll_interval_ms: None,
            ..DataSyncConfig::default()
        };
        drop(listener);

        let mut store: DataSyncStore<OffchainData, i64> =
            DataSyncStoreBuilder::from_config(&config, ApiPath::OFFCHAIN_DATA).keyed().build().unwrap();
        assert!(matches!(store.start().await, Some(FetchOutcome::Failed(SyncError::NetworkFailure(_)))));
        assert!(store.is_empty().await);
        assert!(store.current_page().await.items.is_empty());
    }
}

/// Unit tests for individual components
#[cfg(test)]
mod unit_tests {
    use super::super::*;
    use crate::utils::ApiPath;
    use std::time::Duration;

    #[test]
    fn test_config_from_defaults() {
        let config = DataSyncConfig::default();
        assert_eq!(config.endpoint(ApiPath::BLOCK_INFO), "http://localhost:8000/block-info");
        assert_eq!(config.endpoint(&ApiPath::block(12)), "http://localhost:8000/block/12");
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_builder_from_config() {
        let config = DataSyncConfig { page_size: 20, poll_interval_ms: Some(500), ..DataSyncConfig::default() };
        let store: DataSyncStore<DifficultySample, i64> =
            DataSyncStoreBuilder::from_config(&config, ApiPath::DIFFICULTY_ADJUSTMENT).keyed().build().unwrap();

        assert_eq!(store.endpoint(), "http://localhost:8000/difficulty-adjustment");
        assert_eq!(store.poll_interval(), Some(Duration::from_millis(500)));
        assert!(!store.is_running());
    }
}

/// Performance and stress tests
#[cfg(test)]
mod performance_tests {
    use super::super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_large_collection_paging() {
        let body = Value::Array((0..50_000u64).map(|h| json!({"h": h % 40_000, "i": h})).collect());
        let store: DataSyncStore<Value, Option<u64>> = DataSyncStore::builder()
            .fetcher(Arc::new(StaticFetcher::ok("fixture", body)))
            .key_of(|v: &Value| v.get("h").and_then(Value::as_u64))
            .page_size(25)
            .build()
            .unwrap();

        let start_time = Instant::now();
        let outcome = store.refresh().await;
        println!("Merged 50,000 records in {:?}", start_time.elapsed());

        assert_eq!(outcome, FetchOutcome::Applied(MergeStats { received: 50_000, retained: 40_000, duplicates: 10_000 }));
        let last = store.get_page(i64::MAX).await;
        assert_eq!(last.page_index, 1_599);
        assert_eq!(last.items.len(), 25);
        // key 0 was overwritten by record 40_000
        assert_eq!(store.get_page(0).await.items[0]["i"], 40_000);
    }
}
