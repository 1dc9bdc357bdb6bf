//! 同一性キーによるレコードマージ。
//!
//! 既存レコードと取得レコードを同一性キーで突き合わせ、種別ごとの
//! マージ方針 (不変 / 上書き) に従って upsert します。結果は常にキー
//! 昇順で返すため、同じ入力のマージは何度繰り返しても同じ出力になります。

use std::collections::BTreeMap;
use std::fmt::Debug;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use kabu_core::{CompanyRecord, FinancialRecord, PriceRecord, RecordKind};

/// Dataset Store に格納されるレコード。
///
/// `content_eq` は同一性キー以外の内容が等しいかを判定します。観測
/// 日付のような「変更と数えない」フィールドは実装側で除外します。
pub trait StoredRecord: Clone {
    /// 同一性キー。`Ord` がそのまま格納順になります。
    type Key: Ord + Clone + Debug;

    fn key(&self) -> Self::Key;

    fn content_eq(&self, other: &Self) -> bool;
}

impl StoredRecord for CompanyRecord {
    type Key = String;

    fn key(&self) -> String {
        self.code.clone()
    }

    /// 最終観測日は内容比較から除外します (観測日の更新は変更と数えない)。
    fn content_eq(&self, other: &Self) -> bool {
        self.company_name == other.company_name
            && self.sector_code == other.sector_code
            && self.sector_name == other.sector_name
            && self.market_name == other.market_name
            && self.status == other.status
    }
}

impl StoredRecord for PriceRecord {
    type Key = (NaiveDate, String);

    fn key(&self) -> Self::Key {
        (self.date, self.code.clone())
    }

    fn content_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl StoredRecord for FinancialRecord {
    type Key = (String, NaiveDate, String);

    fn key(&self) -> Self::Key {
        (
            self.code.clone(),
            self.period_end,
            self.period_label.clone(),
        )
    }

    fn content_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// 種別ごとのマージ方針。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// 既存優先。同一キーで内容が異なる行は重複として記録し、既存を残す
    /// (株価)。
    Immutable,
    /// 取得側優先。同一キーは常に取得行で置き換え、内容が変わった場合
    /// のみ更新と数える (銘柄・財務)。
    Overwrite,
}

/// マージ 1 回分の結果。
#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    /// 対象レコード種別
    pub kind: RecordKind,
    /// 新規追加された行数
    pub added: usize,
    /// 内容が更新された行数
    pub updated: usize,
    /// 内容に変化がなかった行数
    pub unchanged: usize,
    /// 不変種別で内容不一致だった重複行数 (既存を維持)
    pub conflicts: usize,
}

impl MergeResult {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            added: 0,
            updated: 0,
            unchanged: 0,
            conflicts: 0,
        }
    }

    /// 追加と更新の合計。
    pub fn merged_total(&self) -> usize {
        self.added + self.updated
    }
}

/// 既存レコードに取得レコードをマージし、キー昇順の全体と結果を返します。
pub(crate) fn merge_records<R: StoredRecord>(
    kind: RecordKind,
    existing: Vec<R>,
    incoming: Vec<R>,
    policy: MergePolicy,
) -> (Vec<R>, MergeResult) {
    let mut result = MergeResult::new(kind);
    let mut map: BTreeMap<R::Key, R> = existing
        .into_iter()
        .map(|record| (record.key(), record))
        .collect();

    for record in incoming {
        let key = record.key();
        match map.get(&key) {
            None => {
                map.insert(key, record);
                result.added += 1;
            }
            Some(current) => {
                let same = current.content_eq(&record);
                match policy {
                    MergePolicy::Immutable => {
                        if same {
                            result.unchanged += 1;
                        } else {
                            // 不変種別の内容不一致: 既存を残して記録だけする
                            warn!(
                                kind = %kind,
                                key = ?key,
                                "不変レコードの重複が内容不一致のため既存行を維持"
                            );
                            result.conflicts += 1;
                        }
                    }
                    MergePolicy::Overwrite => {
                        if same {
                            result.unchanged += 1;
                        } else {
                            result.updated += 1;
                        }
                        map.insert(key, record);
                    }
                }
            }
        }
    }

    (map.into_values().collect(), result)
}
