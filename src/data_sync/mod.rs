//! Data Synchronization Layer
//!
//! Keeps the dashboard's data series in sync with the explorer backend:
//!
//! - `DataSyncStore`: poll-or-once fetch, dedup by key, in-memory paging
//! - Secondary exchange-rate fetch for fiat display
//! - `PriceStream`: live trade feed over a WebSocket, append-only
//!
//! Every store replaces its collection wholesale on each successful fetch.
//! Failures are recorded on the store and retried on the next tick.

pub mod config;
pub mod fetcher;
pub mod merge;
pub mod rate;
pub mod records;
pub mod store;
pub mod websocket;

#[cfg(test)]
mod tests;

pub use config::DataSyncConfig;
pub use fetcher::{HttpFetcher, RecordFetcher, StaticFetcher};
pub use merge::{dedup_by_key, merge_response, sequential_keys, KeyFn, MergeStats};
pub use rate::{ExchangeRate, RateSource};
pub use records::{
    BlockDetail, BlockHeight, BlockInfo, DifficultySample, Keyed, MempoolTransaction, OffchainData, Transaction,
    TransactionFee, TransactionInput, TransactionOutput,
};
pub use store::{DataSyncStore, DataSyncStoreBuilder, FetchOutcome, StoreStats};
pub use websocket::{PricePoint, PriceSeries, PriceStream, TradeMessage};
