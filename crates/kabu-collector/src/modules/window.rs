//! 取得対象期間 (FetchWindow) の計算。
//!
//! 増分モードは「ストアに実在する最新日の翌営業日」から始めます。前回の
//! 実行が部分失敗していても、欠けた日付は次の増分実行で自然に再試行
//! されます (意図したのではなく実際に永続化された範囲から窓を導くため)。

use chrono::{Days, NaiveDate};

use kabu_core::MarketCalendar;

/// 同期モード。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// 最終格納日以降のみ取得
    Incremental,
    /// 設定された全履歴期間を取得
    Bulk,
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(Self::Incremental),
            "bulk" => Ok(Self::Bulk),
            other => Err(format!("不明な同期モード: {other}")),
        }
    }
}

/// 窓計算のパラメータ。
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// 明示的な開始日 (指定時はモードより優先)
    pub from: Option<NaiveDate>,
    /// 明示的な終了日
    pub to: Option<NaiveDate>,
    /// 一括取得時の遡及日数
    pub history_days: i64,
}

impl SyncOptions {
    pub fn incremental(history_days: i64) -> Self {
        Self {
            mode: SyncMode::Incremental,
            from: None,
            to: None,
            history_days,
        }
    }

    pub fn bulk(history_days: i64) -> Self {
        Self {
            mode: SyncMode::Bulk,
            from: None,
            to: None,
            history_days,
        }
    }
}

/// 今回の実行で取得すべき営業日の列。同期 1 回分だけ生きる一時データ。
#[derive(Debug, Clone)]
pub struct FetchWindow {
    days: Vec<NaiveDate>,
}

impl FetchWindow {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.days.last().copied()
    }
}

/// 取得対象の営業日列を計算します。
///
/// 終端は今日より厳密に前の直近営業日です。当日のデータは場中で未確定
/// のため取得対象にしません。増分モードでストアが空の場合は一括の窓に
/// 縮退します。開始が終端を超える場合は空の窓 (取得不要) を返します。
pub fn compute_window(
    options: &SyncOptions,
    latest_stored: Option<NaiveDate>,
    today: NaiveDate,
    calendar: &MarketCalendar,
) -> FetchWindow {
    let end = options.to.unwrap_or_else(|| calendar.previous_business_day(today));

    let start = match options.from {
        Some(from) => from,
        None => match (options.mode, latest_stored) {
            (SyncMode::Incremental, Some(latest)) => {
                latest.checked_add_days(Days::new(1)).unwrap_or(latest)
            }
            // 空ストアの増分は一括に縮退
            (SyncMode::Incremental, None) | (SyncMode::Bulk, _) => today
                .checked_sub_days(Days::new(options.history_days.max(0) as u64))
                .unwrap_or(NaiveDate::MIN),
        },
    };

    FetchWindow {
        days: calendar.business_days_between(start, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_incremental_window_skips_weekend() {
        let calendar = MarketCalendar::tokyo();
        let options = SyncOptions::incremental(730);

        // 最新格納日 6/18 (水)、今日 6/23 (月) → 6/19 (木)・6/20 (金)
        let window = compute_window(
            &options,
            Some(ymd(2025, 6, 18)),
            ymd(2025, 6, 23),
            &calendar,
        );

        assert_eq!(window.days(), &[ymd(2025, 6, 19), ymd(2025, 6, 20)]);
    }

    #[test]
    fn test_up_to_date_store_yields_empty_window() {
        let calendar = MarketCalendar::tokyo();
        let options = SyncOptions::incremental(730);

        // 最新格納日が直近の完了営業日と一致 → 取得不要
        let window = compute_window(
            &options,
            Some(ymd(2025, 6, 20)),
            ymd(2025, 6, 23),
            &calendar,
        );

        assert!(window.is_empty());
    }

    #[test]
    fn test_empty_store_degrades_to_bulk() {
        let calendar = MarketCalendar::tokyo();
        let incremental = SyncOptions::incremental(30);
        let bulk = SyncOptions::bulk(30);
        let today = ymd(2025, 6, 23);

        let from_empty = compute_window(&incremental, None, today, &calendar);
        let from_bulk = compute_window(&bulk, Some(ymd(2025, 6, 18)), today, &calendar);

        assert_eq!(from_empty.days(), from_bulk.days());
        assert_eq!(from_empty.first(), Some(ymd(2025, 5, 26)));
    }

    #[test]
    fn test_today_is_never_included() {
        let calendar = MarketCalendar::tokyo();
        let options = SyncOptions::incremental(730);

        // 今日 6/20 (金、営業日) でも終端は前営業日 6/19
        let window = compute_window(
            &options,
            Some(ymd(2025, 6, 16)),
            ymd(2025, 6, 20),
            &calendar,
        );

        assert_eq!(window.last(), Some(ymd(2025, 6, 19)));
    }

    #[test]
    fn test_explicit_range_overrides_mode() {
        let calendar = MarketCalendar::tokyo();
        let options = SyncOptions {
            mode: SyncMode::Incremental,
            from: Some(ymd(2025, 6, 2)),
            to: Some(ymd(2025, 6, 6)),
            history_days: 730,
        };

        let window = compute_window(&options, Some(ymd(2025, 6, 20)), ymd(2025, 6, 23), &calendar);

        assert_eq!(window.first(), Some(ymd(2025, 6, 2)));
        assert_eq!(window.last(), Some(ymd(2025, 6, 6)));
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_window_excludes_holidays() {
        let calendar = MarketCalendar::tokyo();
        let options = SyncOptions {
            mode: SyncMode::Incremental,
            from: Some(ymd(2025, 1, 1)),
            to: Some(ymd(2025, 1, 7)),
            history_days: 730,
        };

        // 1/1〜1/3 は休業、1/4 (土)・1/5 (日) は週末
        let window = compute_window(&options, None, ymd(2025, 1, 8), &calendar);
        assert_eq!(window.days(), &[ymd(2025, 1, 6), ymd(2025, 1, 7)]);
    }

    #[test]
    fn test_sync_mode_from_str() {
        assert_eq!("incremental".parse::<SyncMode>(), Ok(SyncMode::Incremental));
        assert_eq!("bulk".parse::<SyncMode>(), Ok(SyncMode::Bulk));
        assert!("daily".parse::<SyncMode>().is_err());
    }
}
