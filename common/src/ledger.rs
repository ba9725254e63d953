//! インタラクション台帳
//!
//! アイテムごとの記録を所有する唯一の書き手。クリック・返信・削除の報告、
//! 表示状態の更新、描画リストとの突き合わせ（reconcile）を行う。
//! 未知のキーへの報告は何もしない（アイテム削除と同時に届いたUIイベント）。

use crate::category::Category;
use crate::identity::ItemKey;
use crate::record::{InteractionRecord, RecordSnapshot};
use crate::rules::{self, OverrideError, OverrideRule};
use std::collections::{HashMap, HashSet};

/// 突き合わせの結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// 新しく記録を作成したキー（リスト順）
    pub added: Vec<ItemKey>,
    /// 記録を破棄したキー
    pub removed: Vec<ItemKey>,
    /// 識別子を取得できずスキップしたアイテム数
    pub skipped: usize,
}

impl Reconciliation {
    /// 追加も削除もない
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 再分類の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputed {
    pub previous: Category,
    pub category: Category,
    /// 上書きルールの失敗（ルール結果にフォールバック済み）
    pub error: Option<OverrideError>,
}

impl Recomputed {
    pub fn changed(&self) -> bool {
        self.previous != self.category
    }
}

/// インタラクション台帳
#[derive(Debug)]
pub struct InteractionLedger<T> {
    records: HashMap<ItemKey, InteractionRecord<T>>,
    /// 現在の描画リスト順の追跡キー
    order: Vec<ItemKey>,
}

impl<T> Default for InteractionLedger<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Clone> InteractionLedger<T> {
    /// 最新の描画リストと突き合わせる
    ///
    /// 新しいキーには初期状態の記録を作り、リストから消えたキーの記録は破棄する。
    /// 既存の記録はカウンタを保ったまま参照アイテムだけ最新に差し替える。
    /// 同じリストで何度呼んでも結果は変わらない。
    pub fn reconcile<F>(&mut self, items: &[T], extract: F) -> Reconciliation
    where
        F: Fn(&T) -> Option<ItemKey>,
    {
        let mut result = Reconciliation::default();
        let mut seen = HashSet::with_capacity(items.len());
        let mut order = Vec::with_capacity(items.len());

        for item in items {
            let Some(key) = extract(item) else {
                result.skipped += 1;
                continue;
            };
            // 重複キーは最初のアイテムを採用
            if !seen.insert(key.clone()) {
                continue;
            }

            match self.records.get_mut(&key) {
                Some(record) => record.item = item.clone(),
                None => {
                    self.records.insert(key.clone(), InteractionRecord::new(item.clone()));
                    result.added.push(key.clone());
                }
            }
            order.push(key);
        }

        let stale: Vec<ItemKey> = self
            .order
            .iter()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            self.records.remove(&key);
            result.removed.push(key);
        }

        self.order = order;
        result
    }
}

impl<T> InteractionLedger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ItemKey) -> Option<RecordSnapshot<'_, T>> {
        self.records.get(key).map(InteractionRecord::snapshot)
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.records.contains_key(key)
    }

    /// 追跡中のキー（描画リスト順）
    pub fn keys(&self) -> &[ItemKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// クリックを記録。未知のキーなら false
    pub fn report_click(&mut self, key: &ItemKey) -> bool {
        self.update(key, |r| r.clicks = r.clicks.saturating_add(1))
    }

    /// 返信を記録。未知のキーなら false
    pub fn report_reply(&mut self, key: &ItemKey) -> bool {
        self.update(key, |r| r.replies = r.replies.saturating_add(1))
    }

    /// 削除フラグを立てる。未知のキーなら false
    pub fn report_delete(&mut self, key: &ItemKey) -> bool {
        self.update(key, |r| r.deleted = true)
    }

    /// ビューポートに入った。閲覧済みにするがカテゴリは変えない
    pub fn mark_visible(&mut self, key: &ItemKey) -> bool {
        self.update(key, |r| {
            r.has_been_seen = true;
            r.in_view = true;
        })
    }

    /// ビューポートから出た。直前まで表示中だった場合のみ true
    pub fn mark_hidden(&mut self, key: &ItemKey) -> bool {
        match self.records.get_mut(key) {
            Some(record) if record.in_view => {
                record.in_view = false;
                true
            }
            _ => false,
        }
    }

    /// カテゴリを再計算して記録に反映する。未知のキーなら None
    pub fn recompute(
        &mut self,
        key: &ItemKey,
        override_rule: Option<&OverrideRule<T>>,
    ) -> Option<Recomputed> {
        let record = self.records.get_mut(key)?;
        let previous = record.category;
        let resolution = rules::resolve(&record.snapshot(), override_rule);
        record.category = resolution.category;

        Some(Recomputed {
            previous,
            category: resolution.category,
            error: resolution.error,
        })
    }

    /// 全記録を破棄
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    fn update(&mut self, key: &ItemKey, f: impl FnOnce(&mut InteractionRecord<T>)) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identify;
    use serde_json::{json, Value};

    fn items(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| json!({ "id": id })).collect()
    }

    fn reconcile(ledger: &mut InteractionLedger<Value>, list: &[Value]) -> Reconciliation {
        ledger.reconcile(list, |v| v.item_key())
    }

    #[test]
    fn test_reconcile_adds_and_removes() {
        let mut ledger = InteractionLedger::new();
        let first = reconcile(&mut ledger, &items(&["a", "b"]));
        assert_eq!(first.added, vec![ItemKey::from("a"), ItemKey::from("b")]);
        assert!(first.removed.is_empty());

        let second = reconcile(&mut ledger, &items(&["b", "c"]));
        assert_eq!(second.added, vec![ItemKey::from("c")]);
        assert_eq!(second.removed, vec![ItemKey::from("a")]);
        assert_eq!(ledger.keys(), &[ItemKey::from("b"), ItemKey::from("c")]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut ledger = InteractionLedger::new();
        let list = items(&["a", "b"]);
        reconcile(&mut ledger, &list);
        ledger.report_click(&ItemKey::from("a"));

        let again = reconcile(&mut ledger, &list);
        assert!(again.is_noop());
        assert_eq!(ledger.get(&ItemKey::from("a")).map(|r| r.clicks), Some(1));
    }

    #[test]
    fn test_reconcile_skips_missing_identity_and_duplicates() {
        let mut ledger = InteractionLedger::new();
        let list = vec![json!({"id": "a"}), json!({"title": "no id"}), json!({"id": "a"})];
        let result = reconcile(&mut ledger, &list);
        assert_eq!(result.skipped, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_unknown_key_is_noop() {
        let mut ledger: InteractionLedger<Value> = InteractionLedger::new();
        let ghost = ItemKey::from("ghost");
        assert!(!ledger.report_click(&ghost));
        assert!(!ledger.report_reply(&ghost));
        assert!(!ledger.report_delete(&ghost));
        assert!(!ledger.mark_visible(&ghost));
        assert!(ledger.recompute(&ghost, None).is_none());
    }

    #[test]
    fn test_hidden_only_after_visible() {
        let mut ledger = InteractionLedger::new();
        reconcile(&mut ledger, &items(&["a"]));
        let a = ItemKey::from("a");

        assert!(!ledger.mark_hidden(&a));
        assert!(ledger.mark_visible(&a));
        assert!(ledger.mark_hidden(&a));
        assert!(!ledger.mark_hidden(&a));
        assert_eq!(ledger.get(&a).map(|r| r.has_been_seen), Some(true));
    }

    #[test]
    fn test_recompute_reports_change() {
        let mut ledger = InteractionLedger::new();
        reconcile(&mut ledger, &items(&["a"]));
        let a = ItemKey::from("a");

        ledger.report_click(&a);
        let first = ledger.recompute(&a, None).expect("記録が存在する");
        assert!(first.changed());
        assert_eq!(first.category, Category::Important);

        let second = ledger.recompute(&a, None).expect("記録が存在する");
        assert!(!second.changed());
    }

    #[test]
    fn test_reinserted_key_is_fresh() {
        let mut ledger = InteractionLedger::new();
        let a = ItemKey::from("a");
        reconcile(&mut ledger, &items(&["a"]));
        ledger.report_reply(&a);
        ledger.recompute(&a, None);

        reconcile(&mut ledger, &items(&[]));
        reconcile(&mut ledger, &items(&["a"]));
        let record = ledger.get(&a).expect("再作成されている");
        assert_eq!(record.replies, 0);
        assert_eq!(record.category, Category::Normal);
    }
}
