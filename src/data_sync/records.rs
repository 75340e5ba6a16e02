use crate::data_sync::rate::ExchangeRate;
use crate::logic::conversion::{to_display_value, DisplayValue, Unit};
use crate::logic::search::Searchable;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Records with a natural dedup key
pub trait Keyed {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Row of the latest-blocks table (`/block-info`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub id: i64,
    pub height: u64,
    pub avg_tx_count: f64,
    pub difficulty: f64,
    pub block_time: f64,
    pub timestamp: String,
    /// Bytes
    pub size: u64,
    /// Weight units
    pub weight: u64,
}

impl BlockInfo {
    /// Size in kB with three decimals, e.g. `1234.567`
    pub fn size_kb(&self) -> String {
        format!("{:.3}", self.size as f64 / 1000.0)
    }
}

impl Keyed for BlockInfo {
    type Key = u64;

    fn key(&self) -> u64 {
        self.height
    }
}

impl Searchable for BlockInfo {
    fn matches(&self, term: &str) -> bool {
        self.height.to_string().contains(term) || self.id.to_string().contains(term) || self.timestamp.contains(term)
    }
}

/// Current chain tip (`/block-height`, single object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeight {
    pub height: u64,
}

impl Keyed for BlockHeight {
    type Key = u64;

    fn key(&self) -> u64 {
        self.height
    }
}

/// Fee tier (`/transaction-fees`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFee {
    pub priority: String,
    /// sat/vB
    pub fee: f64,
}

impl Keyed for TransactionFee {
    type Key = String;

    fn key(&self) -> String {
        self.priority.clone()
    }
}

impl Searchable for TransactionFee {
    fn matches(&self, term: &str) -> bool {
        self.priority.to_lowercase().contains(&term.to_lowercase())
    }
}

/// Market data pinned to a block (`/offchain-data`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffchainData {
    pub id: i64,
    pub block_height: u64,
    pub btc_price: f64,
    pub market_sentiment: f64,
    pub volume: f64,
    pub high: f64,
    pub low: f64,
    pub timestamp: String,
}

impl Keyed for OffchainData {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }
}

impl Searchable for OffchainData {
    fn matches(&self, term: &str) -> bool {
        self.block_height.to_string().contains(term) || self.timestamp.contains(term)
    }
}

/// Difficulty at a point in time (`/difficulty-adjustment`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultySample {
    /// Unix seconds
    pub timestamp: i64,
    pub difficulty: f64,
}

impl DifficultySample {
    pub fn time(&self) -> SystemTime {
        if self.timestamp >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.timestamp as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.timestamp.unsigned_abs())
        }
    }
}

impl Keyed for DifficultySample {
    type Key = i64;

    fn key(&self) -> i64 {
        self.timestamp
    }
}

/// Mempool entry sized for the treemap (`/mempool-transactions`). The
/// endpoint gives no identifier, so stores of these use
/// [`sequential_keys`](crate::data_sync::merge::sequential_keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolTransaction {
    /// vbytes
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub block_height: u64,
    pub hash: String,
    pub btc: f64,
    /// Satoshis
    pub fee: u64,
    /// Unix seconds
    pub time: i64,
}

impl Transaction {
    pub fn fee_display(&self, unit: Unit, rate: ExchangeRate) -> DisplayValue {
        to_display_value(self.fee, unit, rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub id: i64,
    pub transaction_id: i64,
    pub previous_output: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub id: i64,
    pub transaction_id: i64,
    pub address: String,
    pub value: f64,
}

/// One block with its transactions (`/block/{height}`, single object)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDetail {
    pub block_info: BlockInfo,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub inputs: Vec<TransactionInput>,
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
}

impl BlockDetail {
    pub fn inputs_for(&self, transaction_id: i64) -> impl Iterator<Item = &TransactionInput> {
        self.inputs.iter().filter(move |input| input.transaction_id == transaction_id)
    }

    pub fn outputs_for(&self, transaction_id: i64) -> impl Iterator<Item = &TransactionOutput> {
        self.outputs.iter().filter(move |output| output.transaction_id == transaction_id)
    }

    pub fn total_fees(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.fee).sum()
    }
}

impl Keyed for BlockDetail {
    type Key = u64;

    fn key(&self) -> u64 {
        self.block_info.height
    }
}
