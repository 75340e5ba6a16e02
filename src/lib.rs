// Data Layer: fetch scheduling, dedup, exchange rate, live price feed
pub mod data_sync;
// Logic Layer: paging, unit conversion, search
pub mod logic;

pub mod error;

// Common utilities and types
pub mod utils;

pub use data_sync::{
    BlockDetail, BlockHeight, BlockInfo, DataSyncConfig, DataSyncStore, DataSyncStoreBuilder, DifficultySample,
    ExchangeRate, FetchOutcome, HttpFetcher, Keyed, MempoolTransaction, OffchainData, PricePoint, PriceStream,
    RateSource, RecordFetcher, StoreStats, TransactionFee,
};
pub use error::SyncError;
pub use logic::{paginate, to_display_value, DisplayValue, PageWindow, Searchable, Unit};
pub use utils::{ApiPath, LoadConfigError};
