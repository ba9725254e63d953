//! リスト分類器（公開インターフェース）
//!
//! 描画されたリストのどのアイテムがユーザーに見えたか、どれがクリック・返信
//! されたかを追跡し、アイテムごとのカテゴリを決定的なルールで再分類し続ける。
//! 変更はバッチスケジューラでまとめて公開する。
//!
//! データの流れ:
//! UIがハンドルを結び付ける → 監視が入退出を通知 → 台帳を更新 →
//! ルールで再分類 → スケジューラが公開マップへ反映 → UIが再描画
//!
//! 実行モデルはシングルスレッド。遅延処理は2つだけで、どちらもホストが
//! 1回限りのコールバックとして実行する:
//! - バインド処理（次フレーム）: `take_bind_request` → `run_bind_pass`
//! - フラッシュ（約16ms後）: `take_flush_request` → `poll`

use crate::category::Category;
use crate::clock::Clock;
use crate::identity::{default_extractor, Identify, IdentityExtractor, ItemKey};
use crate::ledger::{InteractionLedger, Reconciliation};
use crate::observer::{AttachHandle, ViewportObserver, VisibilityEntry, WatchToken};
use crate::record::RecordSnapshot;
use crate::rules::{OverrideError, OverrideRule};
use crate::scheduler::{BatchScheduler, FRAME_DELAY};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 上書きルール失敗の通知先
pub type ErrorReporter = Rc<dyn Fn(&ItemKey, &OverrideError)>;

/// 分類器の設定
pub struct ClassifierOptions<T> {
    pub extractor: IdentityExtractor<T>,
    pub override_rule: Option<OverrideRule<T>>,
    pub flush_delay: Duration,
    pub error_reporter: Option<ErrorReporter>,
}

impl<T: Identify + 'static> Default for ClassifierOptions<T> {
    fn default() -> Self {
        Self::with_extractor_rc(default_extractor())
    }
}

impl<T> Clone for ClassifierOptions<T> {
    fn clone(&self) -> Self {
        Self {
            extractor: Rc::clone(&self.extractor),
            override_rule: self.override_rule.clone(),
            flush_delay: self.flush_delay,
            error_reporter: self.error_reporter.clone(),
        }
    }
}

impl<T> ClassifierOptions<T> {
    /// 識別子抽出関数を指定して作成
    pub fn with_extractor<F>(extract: F) -> Self
    where
        F: Fn(&T) -> Option<ItemKey> + 'static,
    {
        Self::with_extractor_rc(Rc::new(extract))
    }

    fn with_extractor_rc(extractor: IdentityExtractor<T>) -> Self {
        Self {
            extractor,
            override_rule: None,
            flush_delay: FRAME_DELAY,
            error_reporter: None,
        }
    }

    pub fn override_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&RecordSnapshot<'_, T>) -> Result<Option<Category>, OverrideError> + 'static,
    {
        self.override_rule = Some(Rc::new(rule));
        self
    }

    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    pub fn on_override_error<F>(mut self, report: F) -> Self
    where
        F: Fn(&ItemKey, &OverrideError) + 'static,
    {
        self.error_reporter = Some(Rc::new(report));
        self
    }
}

/// 1回の公開で反映された変更
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub revision: u64,
    pub at: Duration,
    /// キー順に並べた変更
    pub changes: Vec<(ItemKey, Category)>,
}

/// 要素とキーの対応（バインド済み）
struct Binding<E> {
    token: WatchToken,
    element: E,
}

/// インタラクション駆動のリスト分類器
pub struct ListClassifier<T, O: ViewportObserver> {
    ledger: InteractionLedger<T>,
    scheduler: BatchScheduler,
    /// 公開済みのカテゴリ（フラッシュ済みの状態のみ）
    categories: HashMap<ItemKey, Category>,
    revision: u64,
    handles: HashMap<ItemKey, AttachHandle<O::Element>>,
    bound: HashMap<ItemKey, Binding<O::Element>>,
    tokens: HashMap<WatchToken, ItemKey>,
    next_token: u64,
    observer: O,
    clock: Rc<dyn Clock>,
    extractor: IdentityExtractor<T>,
    override_rule: Option<OverrideRule<T>>,
    error_reporter: Option<ErrorReporter>,
    bind_requested: bool,
    flush_request: Option<Duration>,
    torn_down: bool,
}

impl<T, O: ViewportObserver> ListClassifier<T, O> {
    pub fn new(options: ClassifierOptions<T>, observer: O, clock: Rc<dyn Clock>) -> Self {
        Self {
            ledger: InteractionLedger::new(),
            scheduler: BatchScheduler::new(options.flush_delay),
            categories: HashMap::new(),
            revision: 0,
            handles: HashMap::new(),
            bound: HashMap::new(),
            tokens: HashMap::new(),
            next_token: 1,
            observer,
            clock,
            extractor: options.extractor,
            override_rule: options.override_rule,
            error_reporter: options.error_reporter,
            bind_requested: false,
            flush_request: None,
            torn_down: false,
        }
    }

    // ------------------------------------------------------------------
    // 公開状態
    // ------------------------------------------------------------------

    /// 公開済みカテゴリ（保留中の変更は含まない）
    pub fn categories(&self) -> &HashMap<ItemKey, Category> {
        &self.categories
    }

    pub fn category(&self, key: &ItemKey) -> Option<Category> {
        self.categories.get(key).copied()
    }

    /// 公開のたびに増える版数
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 公開済みカテゴリが一致するキー（リスト順）
    pub fn keys_in(&self, category: Category) -> Vec<ItemKey> {
        self.ledger
            .keys()
            .iter()
            .filter(|key| self.categories.get(*key) == Some(&category))
            .cloned()
            .collect()
    }

    /// キーごとの結び付けハンドル
    pub fn handle(&self, key: &ItemKey) -> Option<AttachHandle<O::Element>> {
        self.handles.get(key).cloned()
    }

    pub fn handles(&self) -> &HashMap<ItemKey, AttachHandle<O::Element>> {
        &self.handles
    }

    /// 記録の読み取り専用ビュー
    pub fn record(&self, key: &ItemKey) -> Option<RecordSnapshot<'_, T>> {
        self.ledger.get(key)
    }

    /// 追跡中のキー（描画リスト順）
    pub fn tracked(&self) -> &[ItemKey] {
        self.ledger.keys()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn is_watching(&self, key: &ItemKey) -> bool {
        self.bound.contains_key(key)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // ------------------------------------------------------------------
    // イベント報告
    // ------------------------------------------------------------------

    /// クリックを報告。未知のキーなら false（何もしない）
    pub fn on_click(&mut self, key: &ItemKey) -> bool {
        if self.torn_down || !self.ledger.report_click(key) {
            return false;
        }
        self.reclassify(key);
        true
    }

    /// 返信を報告。未知のキーなら false（何もしない）
    pub fn on_reply(&mut self, key: &ItemKey) -> bool {
        if self.torn_down || !self.ledger.report_reply(key) {
            return false;
        }
        self.reclassify(key);
        true
    }

    /// 削除を報告。未知のキーなら false（何もしない）
    pub fn on_delete(&mut self, key: &ItemKey) -> bool {
        if self.torn_down || !self.ledger.report_delete(key) {
            return false;
        }
        self.reclassify(key);
        true
    }

    /// 監視側からの入退出バッチを処理する
    ///
    /// まずバッチ全体の閲覧済み・表示中フラグを更新し、そのあとで退出した
    /// アイテムだけを再分類する。入った時点ではカテゴリを変えない。
    pub fn handle_visibility(&mut self, entries: &[VisibilityEntry]) {
        if self.torn_down {
            return;
        }

        let mut exited = Vec::new();
        for entry in entries {
            let Some(key) = self.tokens.get(&entry.token) else {
                continue;
            };
            if entry.visible {
                self.ledger.mark_visible(key);
            } else if self.ledger.mark_hidden(key) {
                exited.push(key.clone());
            }
        }

        for key in exited {
            self.reclassify(&key);
        }
    }

    // ------------------------------------------------------------------
    // 描画リストとの同期
    // ------------------------------------------------------------------

    /// バインド処理の要求を取り出す（次フレームで `run_bind_pass` を呼ぶ）
    pub fn take_bind_request(&mut self) -> bool {
        std::mem::take(&mut self.bind_requested)
    }

    /// 結び付け済みの要素を監視に登録する
    ///
    /// 新たに監視を始めた要素数を返す。要素が差し替わっていれば古い要素の
    /// 監視を外し、外れていれば監視を解除する。
    pub fn run_bind_pass(&mut self) -> usize {
        self.bind_requested = false;
        if self.torn_down {
            return 0;
        }

        let keys: Vec<ItemKey> = self.ledger.keys().to_vec();
        let mut watched = 0;
        for key in keys {
            let element = self.handles.get(&key).and_then(AttachHandle::element);
            let current = self.bound.get(&key).map(|b| b.element.clone());

            match (element, current) {
                (Some(element), Some(current)) if current == element => {}
                (Some(element), _) => {
                    self.release(&key);
                    self.watch(key, element);
                    watched += 1;
                }
                (None, Some(_)) => self.release(&key),
                (None, None) => {}
            }
        }

        if watched > 0 {
            debug!(watched, total = self.bound.len(), "bind pass");
        }
        watched
    }

    fn watch(&mut self, key: ItemKey, element: O::Element) {
        let token = WatchToken::new(self.next_token);
        self.next_token += 1;
        self.observer.watch(&element, token);
        self.tokens.insert(token, key.clone());
        self.bound.insert(key, Binding { token, element });
    }

    fn release(&mut self, key: &ItemKey) {
        if let Some(binding) = self.bound.remove(key) {
            self.observer.unwatch(&binding.element, binding.token);
            self.tokens.remove(&binding.token);
        }
    }

    // ------------------------------------------------------------------
    // 公開（フラッシュ）
    // ------------------------------------------------------------------

    /// フラッシュ予約の要求を取り出す（返り値の遅延後に `poll` を呼ぶ）
    ///
    /// 予約が既に消化・取り消し済みなら要求も残らない。
    pub fn take_flush_request(&mut self) -> Option<Duration> {
        self.flush_request
            .take()
            .filter(|_| self.scheduler.is_scheduled())
    }

    /// 次のフラッシュ期限
    pub fn next_flush_at(&self) -> Option<Duration> {
        self.scheduler.deadline()
    }

    pub fn has_pending(&self) -> bool {
        !self.scheduler.pending().is_empty()
    }

    /// 期限を過ぎていればフラッシュする
    pub fn poll(&mut self) -> Option<Published> {
        if self.torn_down || !self.scheduler.is_due(self.clock.now()) {
            return None;
        }
        self.publish()
    }

    /// 期限を待たずにフラッシュする
    pub fn flush_now(&mut self) -> Option<Published> {
        if self.torn_down {
            return None;
        }
        self.publish()
    }

    fn publish(&mut self) -> Option<Published> {
        let batch = self.scheduler.flush_now();
        self.flush_request = None;
        let batch = batch?;

        let mut changes: Vec<(ItemKey, Category)> = batch
            .into_iter()
            .filter(|(key, category)| {
                self.ledger.contains(key) && self.categories.get(key) != Some(category)
            })
            .collect();
        if changes.is_empty() {
            return None;
        }
        changes.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, category) in &changes {
            self.categories.insert(key.clone(), *category);
        }
        self.revision += 1;

        let at = self.clock.now();
        debug!(revision = self.revision, changes = changes.len(), "published categories");
        Some(Published {
            revision: self.revision,
            at,
            changes,
        })
    }

    fn reclassify(&mut self, key: &ItemKey) {
        let Some(result) = self.ledger.recompute(key, self.override_rule.as_ref()) else {
            return;
        };

        if let Some(error) = &result.error {
            warn!(%key, %error, "override rule failed, using rule-based category");
            if let Some(report) = &self.error_reporter {
                report(key, error);
            }
        }

        if result.changed() {
            trace!(%key, from = %result.previous, to = %result.category, "reclassified");
            self.queue(key.clone(), result.category);
        }
    }

    fn queue(&mut self, key: ItemKey, category: Category) {
        let now = self.clock.now();
        if self.scheduler.enqueue(key, category, now).is_some() {
            self.flush_request = Some(self.scheduler.delay());
        }
    }

    // ------------------------------------------------------------------
    // 破棄
    // ------------------------------------------------------------------

    /// 分類器を破棄する（UIのアンマウント相当）
    ///
    /// 保留中のフラッシュを取り消し（バッファは適用しない）、全監視を停止し、
    /// 要素とキーの対応を解放する。公開済みカテゴリも空になる。
    /// 以降の呼び出しは何もしない。
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.cancel();
        self.observer.disconnect();
        self.tokens.clear();
        self.bound.clear();
        self.handles.clear();
        self.ledger.clear();
        self.categories.clear();
        self.bind_requested = false;
        self.flush_request = None;
        debug!("classifier torn down");
    }
}

impl<T: Clone, O: ViewportObserver> ListClassifier<T, O> {
    /// 描画リストとの突き合わせ
    ///
    /// 新しいキーの記録とハンドルを作り（初期カテゴリ normal を公開待ちに積む）、
    /// 消えたキーの監視を外して公開マップから即座に取り除く。リストが
    /// 変わっていなければ何も起きない。
    pub fn reconcile(&mut self, items: &[T]) -> Reconciliation {
        if self.torn_down {
            return Reconciliation::default();
        }

        let extract = Rc::clone(&self.extractor);
        let result = self.ledger.reconcile(items, |item| extract(item));

        for key in &result.added {
            self.handles.entry(key.clone()).or_default();
            self.queue(key.clone(), Category::Normal);
        }

        let mut unpublished = false;
        for key in &result.removed {
            self.release(key);
            self.handles.remove(key);
            self.scheduler.forget(key);
            unpublished |= self.categories.remove(key).is_some();
        }
        if unpublished {
            self.revision += 1;
        }

        if !result.added.is_empty() || self.bound.len() < self.ledger.len() {
            self.bind_requested = true;
        }

        if !result.is_noop() || result.skipped > 0 {
            debug!(
                added = result.added.len(),
                removed = result.removed.len(),
                skipped = result.skipped,
                tracked = self.ledger.len(),
                "reconciled list"
            );
        }
        result
    }
}

impl<T, O: ViewportObserver> Drop for ListClassifier<T, O> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::observer::ManualViewport;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    type Classifier = ListClassifier<Value, ManualViewport<String>>;

    fn setup(options: ClassifierOptions<Value>) -> (Classifier, ManualClock) {
        let clock = ManualClock::new();
        let classifier = ListClassifier::new(options, ManualViewport::new(), Rc::new(clock.clone()));
        (classifier, clock)
    }

    fn items(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| json!({ "id": id })).collect()
    }

    /// 突き合わせ → 要素結び付け → バインド処理 → 初回フラッシュ
    fn mount(classifier: &mut Classifier, clock: &ManualClock, ids: &[&str]) {
        classifier.reconcile(&items(ids));
        for id in ids {
            let handle = classifier.handle(&ItemKey::from(*id)).expect("ハンドルがある");
            handle.attach(format!("card-{}", id));
        }
        assert!(classifier.take_bind_request());
        classifier.run_bind_pass();
        clock.advance(FRAME_DELAY);
        classifier.poll();
    }

    fn key(id: &str) -> ItemKey {
        ItemKey::from(id)
    }

    #[test]
    fn test_new_items_publish_normal() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        classifier.reconcile(&items(&["a", "b"]));
        assert!(classifier.categories().is_empty());
        assert_eq!(classifier.take_flush_request(), Some(FRAME_DELAY));

        assert!(classifier.poll().is_none());
        clock.advance(FRAME_DELAY);
        let published = classifier.poll().expect("公開される");
        assert_eq!(published.changes.len(), 2);
        assert_eq!(classifier.category(&key("a")), Some(Category::Normal));
    }

    #[test]
    fn test_pending_changes_invisible_until_flush() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["a"]);

        classifier.on_click(&key("a"));
        assert_eq!(classifier.category(&key("a")), Some(Category::Normal));
        assert!(classifier.has_pending());

        clock.advance(FRAME_DELAY);
        classifier.poll();
        assert_eq!(classifier.category(&key("a")), Some(Category::Important));
    }

    #[test]
    fn test_bind_pass_watches_attached_elements_only() {
        let (mut classifier, _clock) = setup(ClassifierOptions::default());
        classifier.reconcile(&items(&["a", "b"]));
        classifier
            .handle(&key("a"))
            .expect("ハンドルがある")
            .attach("card-a".to_string());

        assert_eq!(classifier.run_bind_pass(), 1);
        assert!(classifier.is_watching(&key("a")));
        assert!(!classifier.is_watching(&key("b")));
        // 変化がなければ再登録しない
        assert_eq!(classifier.run_bind_pass(), 0);
    }

    #[test]
    fn test_rebind_replaced_element() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["a"]);
        let handle = classifier.handle(&key("a")).expect("ハンドルがある");

        handle.attach("card-a-remounted".to_string());
        assert_eq!(classifier.run_bind_pass(), 1);
        assert!(!classifier.observer().is_watching(&"card-a".to_string()));
        assert!(classifier.observer().is_watching(&"card-a-remounted".to_string()));

        handle.detach();
        classifier.run_bind_pass();
        assert!(!classifier.is_watching(&key("a")));
    }

    #[test]
    fn test_enter_does_not_change_category() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["a"]);

        let batch = classifier.observer().enter(&["card-a".to_string()]);
        classifier.handle_visibility(&batch);
        assert!(!classifier.has_pending());
        assert_eq!(classifier.record(&key("a")).map(|r| r.has_been_seen), Some(true));
    }

    #[test]
    fn test_removal_unwatches_and_unpublishes() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["a", "b"]);
        let before = classifier.revision();

        classifier.on_click(&key("a"));
        let result = classifier.reconcile(&items(&["b"]));
        assert_eq!(result.removed, vec![key("a")]);
        assert!(classifier.category(&key("a")).is_none());
        assert!(classifier.handle(&key("a")).is_none());
        assert!(!classifier.observer().is_watching(&"card-a".to_string()));
        assert_eq!(classifier.revision(), before + 1);

        // 保留中だった a の変更は公開されない
        clock.advance(FRAME_DELAY);
        assert!(classifier.poll().is_none());
        assert!(classifier.category(&key("a")).is_none());
    }

    #[test]
    fn test_override_applies_and_failure_is_reported() {
        let reported = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reported);
        let options = ClassifierOptions::default()
            .override_rule(|record: &RecordSnapshot<'_, Value>| {
                match record.item.get("id").and_then(Value::as_str) {
                    Some("vip") => Ok(Some(Category::Priority)),
                    Some("broken") => Err(OverrideError::new("bad rule")),
                    _ => Ok(None),
                }
            })
            .on_override_error(move |key, error| sink.borrow_mut().push((key.clone(), error.clone())));

        let (mut classifier, clock) = setup(options);
        mount(&mut classifier, &clock, &["vip", "broken"]);

        classifier.on_click(&key("vip"));
        classifier.on_click(&key("broken"));
        clock.advance(FRAME_DELAY);
        classifier.poll();

        assert_eq!(classifier.category(&key("vip")), Some(Category::Priority));
        assert_eq!(classifier.category(&key("broken")), Some(Category::Important));
        assert_eq!(reported.borrow().len(), 1);
        assert_eq!(reported.borrow()[0].0, key("broken"));
    }

    #[test]
    fn test_custom_extractor_skips_unidentifiable() {
        let options = ClassifierOptions::with_extractor(|v: &Value| {
            v.get("slug").and_then(Value::as_str).map(ItemKey::from)
        });
        let (mut classifier, _clock) = setup(options);
        let result = classifier.reconcile(&[json!({"slug": "x"}), json!({"id": "y"})]);
        assert_eq!(result.added, vec![key("x")]);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_teardown_cancels_everything() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["a"]);
        classifier.on_reply(&key("a"));

        classifier.teardown();
        assert!(classifier.observer().is_disconnected());
        assert!(classifier.take_flush_request().is_none());

        clock.advance(FRAME_DELAY * 4);
        assert!(classifier.poll().is_none());
        assert!(classifier.flush_now().is_none());
        assert!(!classifier.on_click(&key("a")));
        assert!(classifier.categories().is_empty());
        assert!(classifier.tracked().is_empty());
    }

    #[test]
    fn test_flush_request_cleared_by_publish() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        classifier.reconcile(&items(&["a"]));
        clock.advance(FRAME_DELAY);
        assert!(classifier.poll().is_some());
        assert!(classifier.next_flush_at().is_none());
        assert!(classifier.take_flush_request().is_none());

        classifier.reconcile(&items(&["a"]));
        assert!(classifier.take_flush_request().is_none());

        classifier.on_click(&key("a"));
        assert!(classifier.flush_now().is_some());
        assert!(classifier.take_flush_request().is_none());
    }

    #[test]
    fn test_keys_in_follows_list_order() {
        let (mut classifier, clock) = setup(ClassifierOptions::default());
        mount(&mut classifier, &clock, &["b", "a", "c"]);
        classifier.on_click(&key("c"));
        classifier.on_click(&key("b"));
        classifier.flush_now();

        assert_eq!(classifier.keys_in(Category::Important), vec![key("b"), key("c")]);
        assert_eq!(classifier.keys_in(Category::Normal), vec![key("a")]);
        assert!(classifier.keys_in(Category::Priority).is_empty());
    }
}
