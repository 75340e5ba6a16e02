/// Satoshis in one bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

pub const BTC_DECIMALS: usize = 8;

pub const FIAT_DECIMALS: usize = 2;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// CoinGecko simple-price endpoint, answers `{"bitcoin":{"usd":<f64>}}`.
pub const DEFAULT_RATE_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

pub const DEFAULT_PRICE_STREAM_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@trade";

#[non_exhaustive]
pub struct ApiPath;

impl ApiPath {
    pub const BLOCK_HEIGHT: &'static str = "/block-height";
    pub const BLOCK_INFO: &'static str = "/block-info";
    pub const TRANSACTION_FEES: &'static str = "/transaction-fees";
    pub const OFFCHAIN_DATA: &'static str = "/offchain-data";
    pub const DIFFICULTY_ADJUSTMENT: &'static str = "/difficulty-adjustment";
    pub const MEMPOOL_TRANSACTIONS: &'static str = "/mempool-transactions";

    /// Path of the detail endpoint for one block.
    pub fn block(height: u64) -> String {
        format!("/block/{height}")
    }
}
