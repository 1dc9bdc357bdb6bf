//! ドメイン型の定義。

pub mod market_data;
pub mod records;

pub use market_data::{FetchError, MarketDataProvider};
pub use records::{
    CompanyRecord, FinancialRecord, ListingStatus, PeriodType, PriceRecord, RecordKind,
};
