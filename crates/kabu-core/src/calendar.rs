//! 営業日カレンダー。
//!
//! 東京証券取引所の営業日判定を純粋関数として提供します。休日集合は
//! 静的データとしてバイナリに埋め込み、実行時に外部から取得しません。
//! 同じ入力は常に同じ結果を返すため、テストは決定的になります。

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

/// 東証の営業日カレンダー。
///
/// 週末と祝日 (国民の祝日 + 取引所休業日) を非営業日として扱います。
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    /// 休日集合
    holidays: HashSet<NaiveDate>,
    /// 週末を非営業日として扱うか
    skip_weekends: bool,
}

impl MarketCalendar {
    /// 東証カレンダー (2024〜2026 年の休日表入り) を生成。
    pub fn tokyo() -> Self {
        let mut holidays = HashSet::new();
        for table in [jp_holidays_2024(), jp_holidays_2025(), jp_holidays_2026()] {
            for date_str in table {
                if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                    holidays.insert(date);
                }
            }
        }
        Self {
            holidays,
            skip_weekends: true,
        }
    }

    /// 週末の扱いを設定。
    pub fn with_skip_weekends(mut self, skip: bool) -> Self {
        self.skip_weekends = skip;
        self
    }

    /// 休日を追加。
    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    /// 週末かどうか。
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 休日かどうか。
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// 営業日かどうか。
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        if self.skip_weekends && Self::is_weekend(date) {
            return false;
        }
        !self.is_holiday(date)
    }

    /// 指定日より厳密に前の直近営業日。
    pub fn previous_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        loop {
            day = day.pred_opt().unwrap_or(NaiveDate::MIN);
            if day == NaiveDate::MIN || self.is_business_day(day) {
                return day;
            }
        }
    }

    /// 指定日より厳密に後の直近営業日。
    pub fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        loop {
            day = day.succ_opt().unwrap_or(NaiveDate::MAX);
            if day == NaiveDate::MAX || self.is_business_day(day) {
                return day;
            }
        }
    }

    /// 指定日以前の直近営業日 (指定日が営業日ならその日)。
    pub fn latest_business_day(&self, date: NaiveDate) -> NaiveDate {
        if self.is_business_day(date) {
            date
        } else {
            self.previous_business_day(date)
        }
    }

    /// 区間 [start, end] 内の営業日を昇順で列挙。
    ///
    /// start > end の場合はエラーではなく空列を返します。
    pub fn business_days_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_business_day(*day))
            .collect()
    }
}

/// 2024 年の休日 (国民の祝日・振替休日・取引所休業日)。
fn jp_holidays_2024() -> &'static [&'static str] {
    &[
        "2024-01-01", // 元日
        "2024-01-02", // 取引所休業日
        "2024-01-03", // 取引所休業日
        "2024-01-08", // 成人の日
        "2024-02-11", // 建国記念の日
        "2024-02-12", // 振替休日
        "2024-02-23", // 天皇誕生日
        "2024-03-20", // 春分の日
        "2024-04-29", // 昭和の日
        "2024-05-03", // 憲法記念日
        "2024-05-04", // みどりの日
        "2024-05-05", // こどもの日
        "2024-05-06", // 振替休日
        "2024-07-15", // 海の日
        "2024-08-11", // 山の日
        "2024-08-12", // 振替休日
        "2024-09-16", // 敬老の日
        "2024-09-22", // 秋分の日
        "2024-09-23", // 振替休日
        "2024-10-14", // スポーツの日
        "2024-11-03", // 文化の日
        "2024-11-04", // 振替休日
        "2024-11-23", // 勤労感謝の日
        "2024-12-31", // 取引所休業日
    ]
}

/// 2025 年の休日。
fn jp_holidays_2025() -> &'static [&'static str] {
    &[
        "2025-01-01", // 元日
        "2025-01-02", // 取引所休業日
        "2025-01-03", // 取引所休業日
        "2025-01-13", // 成人の日
        "2025-02-11", // 建国記念の日
        "2025-02-23", // 天皇誕生日
        "2025-02-24", // 振替休日
        "2025-03-20", // 春分の日
        "2025-04-29", // 昭和の日
        "2025-05-03", // 憲法記念日
        "2025-05-04", // みどりの日
        "2025-05-05", // こどもの日
        "2025-05-06", // 振替休日
        "2025-07-21", // 海の日
        "2025-08-11", // 山の日
        "2025-09-15", // 敬老の日
        "2025-09-23", // 秋分の日
        "2025-10-13", // スポーツの日
        "2025-11-03", // 文化の日
        "2025-11-23", // 勤労感謝の日
        "2025-11-24", // 振替休日
        "2025-12-31", // 取引所休業日
    ]
}

/// 2026 年の休日。
fn jp_holidays_2026() -> &'static [&'static str] {
    &[
        "2026-01-01", // 元日
        "2026-01-02", // 取引所休業日
        "2026-01-03", // 取引所休業日
        "2026-01-12", // 成人の日
        "2026-02-11", // 建国記念の日
        "2026-02-23", // 天皇誕生日
        "2026-03-20", // 春分の日
        "2026-04-29", // 昭和の日
        "2026-05-03", // 憲法記念日
        "2026-05-04", // みどりの日
        "2026-05-05", // こどもの日
        "2026-05-06", // 振替休日
        "2026-07-20", // 海の日
        "2026-08-11", // 山の日
        "2026-09-21", // 敬老の日
        "2026-09-22", // 国民の休日
        "2026-09-23", // 秋分の日
        "2026-10-12", // スポーツの日
        "2026-11-03", // 文化の日
        "2026-11-23", // 勤労感謝の日
        "2026-12-31", // 取引所休業日
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekend_check() {
        let saturday = ymd(2025, 6, 21);
        let monday = ymd(2025, 6, 23);

        assert!(MarketCalendar::is_weekend(saturday));
        assert!(!MarketCalendar::is_weekend(monday));
    }

    #[test]
    fn test_holiday_check() {
        let calendar = MarketCalendar::tokyo();

        assert!(calendar.is_holiday(ymd(2025, 1, 1))); // 元日
        assert!(calendar.is_holiday(ymd(2025, 2, 24))); // 振替休日
        assert!(!calendar.is_holiday(ymd(2025, 1, 6)));

        assert!(!calendar.is_business_day(ymd(2025, 1, 1)));
        assert!(calendar.is_business_day(ymd(2025, 1, 6)));
    }

    #[test]
    fn test_add_holiday_excludes_ad_hoc_closure() {
        let mut calendar = MarketCalendar::tokyo();
        // 臨時休業日を追加 (2025-06-18 は本来の営業日)
        let closure = ymd(2025, 6, 18);
        assert!(calendar.is_business_day(closure));

        calendar.add_holiday(closure);

        assert!(calendar.is_holiday(closure));
        assert!(!calendar.is_business_day(closure));
        let days = calendar.business_days_between(ymd(2025, 6, 16), ymd(2025, 6, 20));
        assert_eq!(
            days,
            vec![ymd(2025, 6, 16), ymd(2025, 6, 17), ymd(2025, 6, 19), ymd(2025, 6, 20)]
        );
    }

    #[test]
    fn test_year_end_closure() {
        let calendar = MarketCalendar::tokyo();

        assert!(!calendar.is_business_day(ymd(2024, 12, 31)));
        assert!(!calendar.is_business_day(ymd(2025, 1, 2)));
        assert!(!calendar.is_business_day(ymd(2025, 1, 3)));
        assert!(calendar.is_business_day(ymd(2024, 12, 30)));
    }

    #[test]
    fn test_previous_business_day_skips_weekend() {
        let calendar = MarketCalendar::tokyo();

        // 月曜の前営業日は金曜
        assert_eq!(
            calendar.previous_business_day(ymd(2025, 6, 23)),
            ymd(2025, 6, 20)
        );
    }

    #[test]
    fn test_previous_business_day_skips_year_end() {
        let calendar = MarketCalendar::tokyo();

        // 年末年始休業をまたぐ
        assert_eq!(
            calendar.previous_business_day(ymd(2025, 1, 6)),
            ymd(2024, 12, 30)
        );
    }

    #[test]
    fn test_next_business_day() {
        let calendar = MarketCalendar::tokyo();

        assert_eq!(
            calendar.next_business_day(ymd(2025, 6, 20)),
            ymd(2025, 6, 23)
        );
        // 金曜が祝日 (2025-11-24 は月曜の振替休日) の週明け
        assert_eq!(
            calendar.next_business_day(ymd(2025, 11, 21)),
            ymd(2025, 11, 25)
        );
    }

    #[test]
    fn test_latest_business_day() {
        let calendar = MarketCalendar::tokyo();

        // 営業日ならその日、日曜なら直前の金曜
        assert_eq!(calendar.latest_business_day(ymd(2025, 6, 20)), ymd(2025, 6, 20));
        assert_eq!(calendar.latest_business_day(ymd(2025, 6, 22)), ymd(2025, 6, 20));
    }

    #[test]
    fn test_business_days_between() {
        let calendar = MarketCalendar::tokyo();

        let days = calendar.business_days_between(ymd(2025, 6, 16), ymd(2025, 6, 23));
        assert_eq!(
            days,
            vec![
                ymd(2025, 6, 16),
                ymd(2025, 6, 17),
                ymd(2025, 6, 18),
                ymd(2025, 6, 19),
                ymd(2025, 6, 20),
                ymd(2025, 6, 23),
            ]
        );
    }

    #[test]
    fn test_business_days_between_reversed_is_empty() {
        let calendar = MarketCalendar::tokyo();

        let days = calendar.business_days_between(ymd(2025, 6, 23), ymd(2025, 6, 16));
        assert!(days.is_empty());
    }

    #[test]
    fn test_weekends_counted_when_not_skipped() {
        let calendar = MarketCalendar::tokyo().with_skip_weekends(false);

        assert!(calendar.is_business_day(ymd(2025, 6, 21)));
        // 祝日は週末設定と無関係に非営業日
        assert!(!calendar.is_business_day(ymd(2025, 1, 1)));
    }

    proptest! {
        /// 営業日列は昇順・重複なし・全要素が営業日かつ区間内。
        #[test]
        fn prop_business_days_sorted_unique(offset in 0i64..720, span in 0i64..45) {
            let start = ymd(2024, 1, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(span);
            let calendar = MarketCalendar::tokyo();

            let days = calendar.business_days_between(start, end);
            prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(days.iter().all(|d| calendar.is_business_day(*d)));
            prop_assert!(days.iter().all(|d| *d >= start && *d <= end));
        }

        /// 週末が営業日になることはない (既定設定)。
        #[test]
        fn prop_weekend_never_business_day(offset in 0i64..1000) {
            let date = ymd(2024, 1, 1) + chrono::Duration::days(offset);
            let calendar = MarketCalendar::tokyo();

            if MarketCalendar::is_weekend(date) {
                prop_assert!(!calendar.is_business_day(date));
            }
        }
    }
}
