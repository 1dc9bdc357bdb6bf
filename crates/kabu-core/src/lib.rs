//! kabu-core — 日本株データ同期エンジンの中核ドメイン。
//!
//! ドメインレコード、取得エラー分類、データ提供者 trait、営業日カレンダーを
//! 提供します。上位クレート (kabu-store / kabu-jquants / kabu-collector) は
//! ここで定義された型の上に構築されます。

pub mod calendar;
pub mod domain;

pub use calendar::MarketCalendar;
pub use domain::market_data::{FetchError, MarketDataProvider};
pub use domain::records::{
    CompanyRecord, FinancialRecord, ListingStatus, PeriodType, PriceRecord, RecordKind,
};
