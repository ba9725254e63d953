//! 分類器の振る舞いテスト
//!
//! 手動ビューポートと手動時計で入退出・時間経過を再現して検証

use deal_scout_common::{
    Category, ClassifierOptions, ItemKey, ListClassifier, ManualClock, ManualViewport, FRAME_DELAY,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::rc::Rc;

type Classifier = ListClassifier<Value, ManualViewport<String>>;

struct Harness {
    classifier: Classifier,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new();
        let classifier = ListClassifier::new(
            ClassifierOptions::default(),
            ManualViewport::new(),
            Rc::new(clock.clone()),
        );
        Self { classifier, clock }
    }

    /// 描画リストを差し替え、カードを結び付けて1フレーム進める
    fn render(&mut self, ids: &[&str]) {
        let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id, "title": id })).collect();
        self.classifier.reconcile(&items);
        if self.classifier.take_bind_request() {
            for (key, handle) in self.classifier.handles() {
                if !handle.is_attached() {
                    handle.attach(format!("card-{}", key));
                }
            }
            self.classifier.run_bind_pass();
        }
        self.settle();
    }

    fn enter(&mut self, ids: &[&str]) {
        let elements: Vec<String> = ids.iter().map(|id| format!("card-{}", id)).collect();
        let batch = self.classifier.observer().enter(&elements);
        self.classifier.handle_visibility(&batch);
    }

    fn exit(&mut self, ids: &[&str]) {
        let elements: Vec<String> = ids.iter().map(|id| format!("card-{}", id)).collect();
        let batch = self.classifier.observer().exit(&elements);
        self.classifier.handle_visibility(&batch);
    }

    /// 公開待ちがあれば期限まで進めてフラッシュ
    fn settle(&mut self) -> usize {
        let mut publishes = 0;
        while let Some(deadline) = self.classifier.next_flush_at() {
            self.clock.set(deadline);
            if self.classifier.poll().is_some() {
                publishes += 1;
            }
        }
        publishes
    }

    fn category(&self, id: &str) -> Option<Category> {
        self.classifier.category(&ItemKey::from(id))
    }
}

fn key(id: &str) -> ItemKey {
    ItemKey::from(id)
}

/// 表示も操作もされないアイテムは normal のまま
#[test]
fn test_untouched_item_stays_normal() {
    let mut h = Harness::new();
    h.render(&["a", "b"]);
    h.enter(&["b"]);
    h.exit(&["b"]);
    h.clock.advance(FRAME_DELAY * 100);
    h.settle();
    assert_eq!(h.category("a"), Some(Category::Normal));
}

/// 返信1回で priority（表示履歴に関係なく）
#[test]
fn test_reply_is_priority_regardless_of_visibility() {
    let mut h = Harness::new();
    h.render(&["a"]);
    h.enter(&["a"]);
    h.exit(&["a"]);
    h.classifier.on_reply(&key("a"));
    h.settle();
    assert_eq!(h.category("a"), Some(Category::Priority));

    h.enter(&["a"]);
    h.exit(&["a"]);
    h.settle();
    assert_eq!(h.category("a"), Some(Category::Priority));
}

/// 3クリックで priority
#[test]
fn test_three_clicks_is_priority() {
    let mut h = Harness::new();
    h.render(&["a"]);
    for _ in 0..3 {
        h.classifier.on_click(&key("a"));
    }
    h.settle();
    assert_eq!(h.category("a"), Some(Category::Priority));
}

/// 1〜2クリック・返信なしで important
#[test]
fn test_one_or_two_clicks_is_important() {
    let mut h = Harness::new();
    h.render(&["a", "b"]);
    h.classifier.on_click(&key("a"));
    h.classifier.on_click(&key("b"));
    h.classifier.on_click(&key("b"));
    h.settle();
    assert_eq!(h.category("a"), Some(Category::Important));
    assert_eq!(h.category("b"), Some(Category::Important));
}

/// 表示後に操作なしで退出すると skip-candidate
#[test]
fn test_seen_then_exit_is_skip_candidate() {
    let mut h = Harness::new();
    h.render(&["a"]);
    h.enter(&["a"]);
    assert_eq!(h.settle(), 0);
    assert_eq!(h.category("a"), Some(Category::Normal));

    h.exit(&["a"]);
    h.settle();
    assert_eq!(h.category("a"), Some(Category::SkipCandidate));
}

/// 削除は以後のクリック・返信より優先
#[test]
fn test_delete_is_absorbing() {
    let mut h = Harness::new();
    h.render(&["a"]);
    h.classifier.on_delete(&key("a"));
    h.classifier.on_click(&key("a"));
    h.classifier.on_reply(&key("a"));
    h.settle();
    assert_eq!(h.category("a"), Some(Category::PendingDeletion));
}

/// 同じリストでの再突き合わせは何も変えず、フラッシュも起きない
#[test]
fn test_reconcile_is_idempotent() {
    let mut h = Harness::new();
    h.render(&["a", "b"]);
    h.classifier.on_click(&key("a"));
    h.settle();
    let revision = h.classifier.revision();

    let items = vec![json!({"id": "a"}), json!({"id": "b"})];
    let result = h.classifier.reconcile(&items);
    assert!(result.is_noop());
    assert!(h.classifier.take_flush_request().is_none());
    assert!(h.classifier.next_flush_at().is_none());
    assert_eq!(h.classifier.revision(), revision);
    assert_eq!(h.category("a"), Some(Category::Important));
}

/// 一度外して戻したアイテムは新しい記録になる
#[test]
fn test_reinserted_item_gets_fresh_record() {
    let mut h = Harness::new();
    h.render(&["a", "b"]);
    h.enter(&["a"]);
    h.classifier.on_click(&key("a"));
    h.classifier.on_delete(&key("a"));
    h.settle();

    h.render(&["b"]);
    assert!(h.category("a").is_none());

    h.render(&["a", "b"]);
    let record = h.classifier.record(&key("a")).expect("記録がある");
    assert_eq!(record.clicks, 0);
    assert_eq!(record.replies, 0);
    assert!(!record.deleted);
    assert!(!record.has_been_seen);
    assert_eq!(record.category, Category::Normal);
    assert_eq!(h.category("a"), Some(Category::Normal));
}

/// 時間窓内の3件の変更は1回の公開にまとまる
#[test]
fn test_three_changes_one_publish() {
    let mut h = Harness::new();
    h.render(&["a", "b", "c"]);
    let revision = h.classifier.revision();

    h.classifier.on_click(&key("a"));
    h.clock.advance(std::time::Duration::from_millis(5));
    h.classifier.on_reply(&key("b"));
    h.clock.advance(std::time::Duration::from_millis(5));
    h.classifier.on_delete(&key("c"));

    // 途中の状態は見えない
    assert!(h.classifier.poll().is_none());
    assert_eq!(h.category("a"), Some(Category::Normal));

    h.clock.advance(FRAME_DELAY);
    let published = h.classifier.poll().expect("公開される");
    assert_eq!(published.revision, revision + 1);
    assert_eq!(
        published.changes,
        vec![
            (key("a"), Category::Important),
            (key("b"), Category::Priority),
            (key("c"), Category::PendingDeletion),
        ]
    );
    assert!(h.classifier.poll().is_none());
}

/// A: 1クリック → important、計3クリック → priority、削除 → pending-deletion
#[test]
fn test_scenario_clicks_then_delete() {
    let mut h = Harness::new();
    h.render(&["A"]);

    h.classifier.on_click(&key("A"));
    h.settle();
    assert_eq!(h.category("A"), Some(Category::Important));

    h.classifier.on_click(&key("A"));
    h.classifier.on_click(&key("A"));
    h.settle();
    assert_eq!(h.category("A"), Some(Category::Priority));

    h.classifier.on_delete(&key("A"));
    h.settle();
    assert_eq!(h.category("A"), Some(Category::PendingDeletion));
}

/// B: 表示→退出で skip-candidate、その後1クリックで important
#[test]
fn test_scenario_skip_then_click() {
    let mut h = Harness::new();
    h.render(&["B"]);

    h.enter(&["B"]);
    h.exit(&["B"]);
    h.settle();
    assert_eq!(h.category("B"), Some(Category::SkipCandidate));

    h.classifier.on_click(&key("B"));
    h.settle();
    assert_eq!(h.category("B"), Some(Category::Important));
}

/// 未知のキーへの報告は何もしない
#[test]
fn test_unknown_key_events_are_ignored() {
    let mut h = Harness::new();
    h.render(&["a"]);
    assert!(!h.classifier.on_click(&key("ghost")));
    assert!(!h.classifier.on_delete(&key("ghost")));
    assert!(!h.classifier.has_pending());
}

/// 1バッチ内の入退出はまとめて反映してから再分類する
#[test]
fn test_batch_visibility_is_consistent() {
    let mut h = Harness::new();
    h.render(&["a", "b"]);
    let elements = vec!["card-a".to_string(), "card-b".to_string()];
    let mut batch = h.classifier.observer().enter(&elements);
    batch.extend(h.classifier.observer().exit(&elements[..1]));
    h.classifier.handle_visibility(&batch);
    h.settle();

    assert_eq!(h.category("a"), Some(Category::SkipCandidate));
    assert_eq!(h.category("b"), Some(Category::Normal));
    assert_eq!(h.classifier.record(&key("b")).map(|r| r.has_been_seen), Some(true));
}

#[derive(Debug, Clone)]
enum Op {
    Enter,
    Exit,
    Click,
    Reply,
    Delete,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Enter),
        Just(Op::Exit),
        Just(Op::Click),
        Just(Op::Reply),
        Just(Op::Delete),
    ]
}

proptest! {
    /// 任意の操作列の後、公開カテゴリは記録からのルール判定と一致する
    #[test]
    fn published_category_matches_record(ops in prop::collection::vec(op(), 0..40)) {
        let mut h = Harness::new();
        h.render(&["x"]);
        for op in &ops {
            match op {
                Op::Enter => h.enter(&["x"]),
                Op::Exit => h.exit(&["x"]),
                Op::Click => { h.classifier.on_click(&key("x")); }
                Op::Reply => { h.classifier.on_reply(&key("x")); }
                Op::Delete => { h.classifier.on_delete(&key("x")); }
            }
        }
        h.settle();

        let record = h.classifier.record(&key("x")).expect("記録がある");
        let expected = if record.deleted {
            Category::PendingDeletion
        } else if record.replies >= 1 || record.clicks >= 3 {
            Category::Priority
        } else if record.clicks >= 1 {
            Category::Important
        } else if ops.iter().any(|op| matches!(op, Op::Exit))
            && record.has_been_seen
            && ops.iter().rposition(|op| matches!(op, Op::Exit))
                > ops.iter().position(|op| matches!(op, Op::Enter))
        {
            Category::SkipCandidate
        } else {
            Category::Normal
        };
        prop_assert_eq!(h.category("x"), Some(expected));
    }
}
