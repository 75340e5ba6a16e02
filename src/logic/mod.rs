// View-side helpers shared by every store: paging, unit conversion, search
pub mod pagination;
pub mod conversion;
pub mod search;

pub use pagination::{paginate, PageWindow};
pub use conversion::{sats_to_btc, to_display_value, DisplayValue, Unit};
pub use search::{filter_records, Searchable};
