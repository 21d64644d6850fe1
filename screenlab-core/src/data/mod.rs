//! Data acquisition, normalization and caching

pub mod cache;
pub mod canonicalize;
pub mod eastmoney;
pub mod provider;
pub mod schema;
pub mod universe;
pub mod valuation;

pub use cache::{CacheEntry, CacheReport, SeriesCache};
pub use canonicalize::Canonicalizer;
pub use eastmoney::EastmoneyClient;
pub use provider::{
    Adjustment, DataError, DataSource, FetchRequest, HistoryProvider, UniverseProvider,
    ValuationProvider,
};
pub use schema::BarSchema;
pub use universe::{UniverseEntry, UniverseFile};
pub use valuation::{Valuations, ValuationsFile};
