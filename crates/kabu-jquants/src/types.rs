//! J-Quants API 応答の wire 型。
//!
//! API は欠損値を `null` または空文字列で返すため、数値・日付は寛容な
//! デシリアライザで `Option` に落とします。ドメインレコードへの変換は
//! 各 item 型の `into_record` が担います。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;

use kabu_core::{CompanyRecord, FinancialRecord, ListingStatus, PriceRecord};

/// ページ送り付き応答。レコード配列とカーソルに分解できる型。
pub(crate) trait PagedResponse: de::DeserializeOwned {
    type Item;

    /// レコード配列と次ページカーソルに分解。
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

// ==== /listed/info ====

#[derive(Debug, Deserialize)]
pub struct ListedInfoResponse {
    pub info: Vec<ListedInfoItem>,
    pub pagination_key: Option<String>,
}

impl PagedResponse for ListedInfoResponse {
    type Item = ListedInfoItem;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.info, self.pagination_key)
    }
}

/// 上場銘柄情報。
#[derive(Debug, Clone, Deserialize)]
pub struct ListedInfoItem {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    #[serde(rename = "Sector33Code", default)]
    pub sector_code: String,
    #[serde(rename = "Sector33CodeName", default)]
    pub sector_name: String,
    #[serde(rename = "MarketCodeName", default)]
    pub market_name: String,
}

impl ListedInfoItem {
    /// 観測日を添えてドメインレコードへ変換。
    ///
    /// 一覧に現れた銘柄は常に上場中として扱います。上場廃止への遷移は
    /// ストア側の突き合わせで行います。
    pub fn into_record(self, observed_on: NaiveDate) -> CompanyRecord {
        CompanyRecord {
            code: self.code,
            company_name: self.company_name,
            sector_code: self.sector_code,
            sector_name: self.sector_name,
            market_name: self.market_name,
            status: ListingStatus::Listed,
            last_seen: observed_on,
        }
    }
}

// ==== /prices/daily_quotes ====

#[derive(Debug, Deserialize)]
pub struct DailyQuotesResponse {
    pub daily_quotes: Vec<DailyQuoteItem>,
    pub pagination_key: Option<String>,
}

impl PagedResponse for DailyQuotesResponse {
    type Item = DailyQuoteItem;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.daily_quotes, self.pagination_key)
    }
}

/// 日次株価。売買の成立しなかった日は四本値と出来高が `null`。
#[derive(Debug, Clone, Deserialize)]
pub struct DailyQuoteItem {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Open", default, deserialize_with = "de_opt_decimal")]
    pub open: Option<Decimal>,
    #[serde(rename = "High", default, deserialize_with = "de_opt_decimal")]
    pub high: Option<Decimal>,
    #[serde(rename = "Low", default, deserialize_with = "de_opt_decimal")]
    pub low: Option<Decimal>,
    #[serde(rename = "Close", default, deserialize_with = "de_opt_decimal")]
    pub close: Option<Decimal>,
    #[serde(rename = "Volume", default, deserialize_with = "de_opt_decimal")]
    pub volume: Option<Decimal>,
    #[serde(
        rename = "AdjustmentFactor",
        default,
        deserialize_with = "de_opt_decimal"
    )]
    pub adjustment_factor: Option<Decimal>,
    #[serde(
        rename = "AdjustmentClose",
        default,
        deserialize_with = "de_opt_decimal"
    )]
    pub adjustment_close: Option<Decimal>,
}

impl DailyQuoteItem {
    /// ドメインレコードへ変換。調整係数の欠損は 1 とみなします。
    pub fn into_record(self) -> PriceRecord {
        PriceRecord {
            date: self.date,
            code: self.code,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            adjustment_factor: self.adjustment_factor.unwrap_or(Decimal::ONE),
            adjustment_close: self.adjustment_close,
        }
    }
}

// ==== /fins/statements ====

#[derive(Debug, Deserialize)]
pub struct StatementsResponse {
    pub statements: Vec<StatementItem>,
    pub pagination_key: Option<String>,
}

impl PagedResponse for StatementsResponse {
    type Item = StatementItem;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.statements, self.pagination_key)
    }
}

/// 財務諸表サマリー。数値は文字列 (欠損は空文字列) で返る。
#[derive(Debug, Clone, Deserialize)]
pub struct StatementItem {
    #[serde(rename = "LocalCode")]
    pub code: String,
    #[serde(rename = "DisclosedDate", default, deserialize_with = "de_opt_date")]
    pub disclosed_date: Option<NaiveDate>,
    #[serde(rename = "TypeOfDocument", default)]
    pub document_type: String,
    #[serde(rename = "TypeOfCurrentPeriod", default)]
    pub period_label: String,
    #[serde(
        rename = "CurrentPeriodEndDate",
        default,
        deserialize_with = "de_opt_date"
    )]
    pub period_end: Option<NaiveDate>,
    #[serde(rename = "NetSales", default, deserialize_with = "de_opt_decimal")]
    pub net_sales: Option<Decimal>,
    #[serde(
        rename = "OperatingProfit",
        default,
        deserialize_with = "de_opt_decimal"
    )]
    pub operating_profit: Option<Decimal>,
    #[serde(
        rename = "OrdinaryProfit",
        default,
        deserialize_with = "de_opt_decimal"
    )]
    pub ordinary_profit: Option<Decimal>,
    #[serde(rename = "Profit", default, deserialize_with = "de_opt_decimal")]
    pub profit: Option<Decimal>,
    #[serde(
        rename = "EarningsPerShare",
        default,
        deserialize_with = "de_opt_decimal"
    )]
    pub eps: Option<Decimal>,
    #[serde(rename = "Equity", default, deserialize_with = "de_opt_decimal")]
    pub equity: Option<Decimal>,
}

impl StatementItem {
    /// ドメインレコードへ変換。
    ///
    /// 同一性キーを構成できない行 (開示日・期間末日・期間ラベルの欠損)
    /// は `None` を返して取り込み対象から外します。
    pub fn into_record(self) -> Option<FinancialRecord> {
        let period_end = self.period_end?;
        let disclosed_date = self.disclosed_date?;
        if self.period_label.is_empty() {
            return None;
        }

        Some(FinancialRecord {
            code: self.code,
            period_end,
            period_label: self.period_label,
            disclosed_date,
            document_type: self.document_type,
            net_sales: self.net_sales,
            operating_profit: self.operating_profit,
            ordinary_profit: self.ordinary_profit,
            profit: self.profit,
            eps: self.eps,
            equity: self.equity,
        })
    }
}

// ==== 寛容なデシリアライザ ====

/// `null` / 空文字列 / 文字列数値 / JSON 数値をすべて受ける Decimal。
fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<Decimal>()
                    .map(Some)
                    .map_err(|e| de::Error::custom(format!("数値を解析できません ({trimmed}): {e}")))
            }
        }
        Some(serde_json::Value::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("数値を解析できません ({n}): {e}"))),
        Some(other) => Err(de::Error::custom(format!("数値でない値: {other}"))),
    }
}

/// `null` / 空文字列を欠損として扱う `%Y-%m-%d` 日付。
fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| de::Error::custom(format!("日付を解析できません ({s}): {e}"))),
    }
}
