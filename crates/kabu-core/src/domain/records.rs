//! 市場データのドメインレコード。
//!
//! J-Quants API から取得した上場銘柄・株価・財務諸表を、永続化 CSV の
//! 列名と同じフィールド名で保持します。各レコードの同一性キーが
//! Dataset Store のマージ単位になります。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// レコード種別
// =============================================================================

/// レコード種別。Dataset Store のファイル単位に対応します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// 上場銘柄一覧
    Company,
    /// 日次株価
    Price,
    /// 財務諸表
    Financial,
}

impl RecordKind {
    /// ログ・ファイル名で使う識別子。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Price => "price",
            Self::Financial => "financial",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// 上場銘柄
// =============================================================================

/// 上場状態。
///
/// 上場廃止は行削除ではなく状態フラグで表現し、差分通知のための
/// 履歴連続性を保ちます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    /// 上場中
    #[serde(rename = "listed")]
    Listed,
    /// 上場廃止
    #[serde(rename = "delisted")]
    Delisted,
}

/// 上場銘柄レコード。
///
/// 同一性キーは銘柄コード。最新の上場一覧に現れた銘柄は属性を上書き
/// 更新し、現れなかった既存銘柄は `Delisted` に倒します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// 銘柄コード (ゼロ埋め数字文字列、例: "13010")
    #[serde(rename = "Code")]
    pub code: String,
    /// 会社名
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    /// 33 業種コード
    #[serde(rename = "Sector33Code")]
    pub sector_code: String,
    /// 33 業種名
    #[serde(rename = "Sector33CodeName")]
    pub sector_name: String,
    /// 市場区分名 (プライム / スタンダード / グロース など)
    #[serde(rename = "MarketCodeName")]
    pub market_name: String,
    /// 上場状態
    #[serde(rename = "ListingStatus")]
    pub status: ListingStatus,
    /// 最終観測日 (上場一覧にこのコードが現れた最新の日付)
    #[serde(rename = "LastSeenDate")]
    pub last_seen: NaiveDate,
}

impl CompanyRecord {
    /// 同一性キー。
    pub fn key(&self) -> String {
        self.code.clone()
    }
}

// =============================================================================
// 日次株価
// =============================================================================

/// 株価四本値レコード。
///
/// 同一性キーは (取引日, 銘柄コード)。確定した過去の株価は不変として
/// 扱い、同一キーで内容が異なる行は既存優先で重複として記録します。
/// 売買成立のない日は四本値と出来高が欠損します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// 取引日
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// 銘柄コード
    #[serde(rename = "Code")]
    pub code: String,
    /// 始値
    #[serde(rename = "Open")]
    pub open: Option<Decimal>,
    /// 高値
    #[serde(rename = "High")]
    pub high: Option<Decimal>,
    /// 安値
    #[serde(rename = "Low")]
    pub low: Option<Decimal>,
    /// 終値
    #[serde(rename = "Close")]
    pub close: Option<Decimal>,
    /// 出来高
    #[serde(rename = "Volume")]
    pub volume: Option<Decimal>,
    /// 調整係数 (分割・併合時以外は 1)
    #[serde(rename = "AdjustmentFactor")]
    pub adjustment_factor: Decimal,
    /// 調整後終値
    #[serde(rename = "AdjustmentClose")]
    pub adjustment_close: Option<Decimal>,
}

impl PriceRecord {
    /// 同一性キー。格納順は (取引日, 銘柄コード) です。
    pub fn key(&self) -> (NaiveDate, String) {
        (self.date, self.code.clone())
    }
}

// =============================================================================
// 財務諸表
// =============================================================================

/// 会計期間の区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    /// 通期
    Annual,
    /// 四半期
    Quarterly,
}

/// 財務諸表レコード。
///
/// 同一性キーは (銘柄コード, 会計期間末日, 期間ラベル)。訂正開示は
/// 同一キーの上書きで反映します (可変種別)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// 銘柄コード
    #[serde(rename = "Code")]
    pub code: String,
    /// 会計期間末日
    #[serde(rename = "CurrentPeriodEndDate")]
    pub period_end: NaiveDate,
    /// 期間ラベル (FY / 1Q / 2Q / 3Q)
    #[serde(rename = "TypeOfCurrentPeriod")]
    pub period_label: String,
    /// 開示日
    #[serde(rename = "DisclosedDate")]
    pub disclosed_date: NaiveDate,
    /// 開示書類種別
    #[serde(rename = "TypeOfDocument")]
    pub document_type: String,
    /// 売上高
    #[serde(rename = "NetSales")]
    pub net_sales: Option<Decimal>,
    /// 営業利益
    #[serde(rename = "OperatingProfit")]
    pub operating_profit: Option<Decimal>,
    /// 経常利益
    #[serde(rename = "OrdinaryProfit")]
    pub ordinary_profit: Option<Decimal>,
    /// 当期純利益
    #[serde(rename = "Profit")]
    pub profit: Option<Decimal>,
    /// 1 株当たり利益
    #[serde(rename = "EarningsPerShare")]
    pub eps: Option<Decimal>,
    /// 純資産
    #[serde(rename = "Equity")]
    pub equity: Option<Decimal>,
}

impl FinancialRecord {
    /// 同一性キー。
    pub fn key(&self) -> (String, NaiveDate, String) {
        (
            self.code.clone(),
            self.period_end,
            self.period_label.clone(),
        )
    }

    /// 期間ラベルから通期・四半期の区分を導出します。
    pub fn period_type(&self) -> PeriodType {
        if self.period_label == "FY" {
            PeriodType::Annual
        } else {
            PeriodType::Quarterly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_price() -> PriceRecord {
        PriceRecord {
            date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            code: "13010".to_string(),
            open: Some(dec!(4200)),
            high: Some(dec!(4280)),
            low: Some(dec!(4175)),
            close: Some(dec!(4260)),
            volume: Some(dec!(125600)),
            adjustment_factor: dec!(1),
            adjustment_close: Some(dec!(4260)),
        }
    }

    #[test]
    fn test_price_key_is_date_then_code() {
        let record = sample_price();
        let (date, code) = record.key();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
        assert_eq!(code, "13010");
    }

    #[test]
    fn test_period_type_classification() {
        let mut record = FinancialRecord {
            code: "13010".to_string(),
            period_end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            period_label: "FY".to_string(),
            disclosed_date: NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            document_type: "FYFinancialStatements_Consolidated_JP".to_string(),
            net_sales: Some(dec!(285000000000)),
            operating_profit: Some(dec!(24800000000)),
            ordinary_profit: Some(dec!(25300000000)),
            profit: Some(dec!(17100000000)),
            eps: Some(dec!(182.4)),
            equity: Some(dec!(198000000000)),
        };
        assert_eq!(record.period_type(), PeriodType::Annual);

        record.period_label = "2Q".to_string();
        assert_eq!(record.period_type(), PeriodType::Quarterly);
    }

    #[test]
    fn test_record_kind_labels() {
        assert_eq!(RecordKind::Company.as_str(), "company");
        assert_eq!(RecordKind::Price.as_str(), "price");
        assert_eq!(RecordKind::Financial.to_string(), "financial");
    }
}
