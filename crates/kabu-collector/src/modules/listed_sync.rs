//! 上場銘柄一覧の同期。
//!
//! 上場一覧は日付窓を持たない単発の全件取得です。取得 → マージ →
//! 上場廃止の突き合わせ → スナップショット抽出の順で処理し、結果を
//! RunReport にまとめます。

use std::collections::HashSet;
use std::time::Instant;

use tracing::{error, info};

use kabu_core::{MarketDataProvider, RecordKind};
use kabu_store::DatasetStore;

use crate::error::Result;
use crate::report::RunReport;

/// 上場銘柄一覧を同期します。
///
/// 取得失敗時もエラーを伝播せず、失敗を記録したレポートを返します。
/// 成功時のレポートには差分通知用の銘柄コードスナップショットが
/// 含まれます。
pub async fn sync_listed(
    provider: &dyn MarketDataProvider,
    store: &DatasetStore,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new("上場銘柄同期");

    info!(provider = provider.provider_name(), "上場銘柄一覧を取得中");
    let companies = match provider.fetch_listed_companies().await {
        Ok(companies) => companies,
        Err(e) => {
            error!(error = %e, "上場銘柄一覧の取得に失敗");
            report.record_failure(None, "/listed/info", e.to_string());
            report.elapsed = start.elapsed();
            return Ok(report);
        }
    };

    // 空応答のまま突き合わせると全銘柄が上場廃止扱いになってしまう。
    // 一覧が取れなかった回として記録し、既存データには触れない
    if companies.is_empty() {
        error!("上場銘柄一覧が空応答、マージと廃止判定をスキップ");
        report.record_failure(None, "/listed/info", "上場銘柄一覧が空でした".to_string());
        report.elapsed = start.elapsed();
        return Ok(report);
    }

    report.fetched = companies.len();
    let observed: HashSet<String> = companies.iter().map(|c| c.code.clone()).collect();

    match store.merge_companies(companies) {
        Ok(result) => report.absorb_merge(&result),
        Err(e) => {
            // マージできなければ廃止判定もスナップショットも成立しない
            report.record_failure(None, RecordKind::Company.as_str(), e.to_string());
            report.elapsed = start.elapsed();
            return Ok(report);
        }
    }

    match store.mark_delisted(&observed) {
        Ok(changed) => {
            if changed > 0 {
                info!(changed, "上場一覧から消えた銘柄を上場廃止として記録");
            }
        }
        Err(e) => report.record_failure(None, RecordKind::Company.as_str(), e.to_string()),
    }

    match store.snapshot(RecordKind::Company) {
        Ok(snapshot) => report.snapshot = Some(snapshot),
        Err(e) => report.record_failure(None, RecordKind::Company.as_str(), e.to_string()),
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use kabu_core::{
        CompanyRecord, FetchError, FinancialRecord, ListingStatus, PriceRecord,
    };

    use crate::report::RunOutcome;

    use super::*;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store() -> (PathBuf, DatasetStore) {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("kabu_listed_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        (dir.clone(), DatasetStore::new(dir))
    }

    fn company(code: &str, name: &str) -> CompanyRecord {
        CompanyRecord {
            code: code.to_string(),
            company_name: name.to_string(),
            sector_code: "0050".to_string(),
            sector_name: "水産・農林業".to_string(),
            market_name: "プライム".to_string(),
            status: ListingStatus::Listed,
            last_seen: NaiveDate::from_ymd_opt(2025, 6, 23).unwrap(),
        }
    }

    struct FixedProvider {
        companies: Vec<CompanyRecord>,
        fail: bool,
    }

    #[async_trait]
    impl MarketDataProvider for FixedProvider {
        async fn fetch_listed_companies(&self) -> std::result::Result<Vec<CompanyRecord>, FetchError> {
            if self.fail {
                return Err(FetchError::Transient {
                    resource: "/listed/info".to_string(),
                    reason: "timeout".to_string(),
                });
            }
            Ok(self.companies.clone())
        }

        async fn fetch_daily_quotes(
            &self,
            _date: NaiveDate,
        ) -> std::result::Result<Vec<PriceRecord>, FetchError> {
            Ok(vec![])
        }

        async fn fetch_statements(
            &self,
            _disclosed_on: NaiveDate,
        ) -> std::result::Result<Vec<FinancialRecord>, FetchError> {
            Ok(vec![])
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_sync_listed_merges_and_snapshots() {
        let (dir, store) = temp_store();
        let provider = FixedProvider {
            companies: vec![company("7203", "トヨタ自動車"), company("1301", "極洋")],
            fail: false,
        };

        let report = sync_listed(&provider, &store).await.unwrap();

        assert_eq!(report.outcome(), RunOutcome::Done);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.merged, 2);
        assert_eq!(
            report.snapshot,
            Some(vec!["1301".to_string(), "7203".to_string()])
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_sync_listed_marks_missing_codes_delisted() {
        let (dir, store) = temp_store();

        // 前回は 2 銘柄、今回の一覧には 7203 だけ
        store
            .merge_companies(vec![company("1301", "極洋"), company("7203", "トヨタ自動車")])
            .unwrap();
        let provider = FixedProvider {
            companies: vec![company("7203", "トヨタ自動車")],
            fail: false,
        };

        let report = sync_listed(&provider, &store).await.unwrap();
        assert_eq!(report.outcome(), RunOutcome::Done);

        let companies = store.load_companies().unwrap();
        assert_eq!(companies[0].code, "1301");
        assert_eq!(companies[0].status, ListingStatus::Delisted);
        assert_eq!(companies[1].status, ListingStatus::Listed);

        // 廃止銘柄もスナップショットには残る (行は削除しない)
        assert_eq!(report.snapshot.unwrap().len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_empty_listing_does_not_delist_existing_companies() {
        let (dir, store) = temp_store();
        store
            .merge_companies(vec![company("1301", "極洋"), company("7203", "トヨタ自動車")])
            .unwrap();

        // 取得自体は成功だが 0 件 — 既存 2 銘柄がそのまま残ること
        let provider = FixedProvider {
            companies: vec![],
            fail: false,
        };
        let report = sync_listed(&provider, &store).await.unwrap();

        assert_eq!(report.outcome(), RunOutcome::PartiallyFailed);
        assert!(report.snapshot.is_none());

        let companies = store.load_companies().unwrap();
        assert_eq!(companies.len(), 2);
        assert!(companies.iter().all(|c| c.status == ListingStatus::Listed));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_report_not_error() {
        let (dir, store) = temp_store();
        let provider = FixedProvider {
            companies: vec![],
            fail: true,
        };

        let report = sync_listed(&provider, &store).await.unwrap();

        assert_eq!(report.outcome(), RunOutcome::PartiallyFailed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource, "/listed/info");
        assert!(report.snapshot.is_none());
        // 取得に失敗した回では既存データに手を付けない
        assert!(store.load_companies().unwrap().is_empty());

        let _ = fs::remove_dir_all(&dir);
    }
}
