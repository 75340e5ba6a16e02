/// Dashboard Feed Example
///
/// Polls the latest-blocks table from the explorer API, converts fees with
/// the live BTC/USD rate and follows the trade stream for a minute.
use explorer_sync::data_sync::{
    BlockInfo, DataSyncConfig, DataSyncStore, DataSyncStoreBuilder, HttpFetcher, PriceStream, RateSource,
    TransactionFee,
};
use explorer_sync::{ApiPath, Unit};
use eyre::Result;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting dashboard feed");

    let config = DataSyncConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from environment ({}), using defaults", e);
        DataSyncConfig::default()
    });

    info!("Configuration loaded: API={}, stream={}", config.api_base_url, config.price_stream_url);

    let mut blocks: DataSyncStore<BlockInfo, u64> =
        DataSyncStoreBuilder::from_config(&config, ApiPath::BLOCK_INFO).keyed().build()?;

    let rate_fetcher = HttpFetcher::new(config.rate_url.clone(), config.http_timeout())?;
    let mut fees: DataSyncStore<TransactionFee, String> =
        DataSyncStoreBuilder::from_config(&config, ApiPath::TRANSACTION_FEES)
            .keyed()
            .secondary_rate(RateSource::coingecko_usd(rate_fetcher))
            .build()?;

    let mut prices = PriceStream::from_config(&config);

    if let Some(outcome) = blocks.start().await {
        info!("Initial block fetch: {:?}", outcome);
    }
    fees.start().await;
    prices.start();

    for round in 1..=6 {
        sleep(Duration::from_secs(10)).await;

        let page = blocks.current_page().await;
        info!(
            "Round {}: page {}/{} with {} blocks",
            round,
            page.page_index + 1,
            page.total_pages.max(1),
            page.items.len()
        );
        for block in &page.items {
            info!("  #{} {} txs {} kB", block.height, block.avg_tx_count, block.size_kb());
        }

        // fee tiers are sat/vB; show a 250 vB transaction at each tier
        for tier in fees.records().await {
            let raw = (tier.fee * 250.0).round() as u64;
            info!(
                "  {} fee: {} BTC / {}",
                tier.priority,
                fees.display_value(raw, Unit::BTC).await,
                fees.display_value(raw, Unit::USD).await
            );
        }

        match prices.latest().await {
            Some(point) => info!("  last trade {} at {} ({} points)", point.price, point.time_ms, prices.len().await),
            None => info!("  no trades yet"),
        }

        if let Some(e) = blocks.last_error().await {
            warn!("  last block fetch failed: {}", e);
        }
    }

    blocks.stop().await;
    fees.stop().await;
    prices.stop().await;

    info!("Dashboard feed stopped");
    Ok(())
}
