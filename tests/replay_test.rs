//! リプレイ（フレームループ）テスト
//!
//! tokio の一時停止した時計で、スクリプトを時刻どおりに再生して検証

use deal_scout::replay::{run_replay, Script, ScriptEvent, ScriptStep};
use deal_scout_common::{Category, Deal, ItemKey};
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

fn deals(ids: &[&str]) -> Vec<Deal> {
    ids.iter()
        .map(|id| Deal {
            id: Some(id.to_string()),
            title: format!("Deal {}", id),
            ..Default::default()
        })
        .collect()
}

fn step(at: u64, event: ScriptEvent) -> ScriptStep {
    ScriptStep { at, event }
}

fn keys(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// 突き合わせ直後の初回公開で全件 normal
#[tokio::test(start_paused = true)]
async fn test_initial_reconcile_publishes_normal() {
    let script = Script {
        events: vec![step(0, ScriptEvent::Reconcile { keys: None })],
    };
    let report = run_replay(&deals(&["a", "b"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    assert_eq!(report.published.len(), 1);
    assert_eq!(report.published[0].revision, 1);
    assert_eq!(report.published[0].at_ms, 16);
    assert_eq!(report.category("a"), Some(Category::Normal));
    assert_eq!(report.category("b"), Some(Category::Normal));
}

/// 時間窓内の変更は1回の公開にまとまる
#[tokio::test(start_paused = true)]
async fn test_changes_within_window_publish_once() {
    let script = Script {
        events: vec![
            step(0, ScriptEvent::Reconcile { keys: None }),
            step(100, ScriptEvent::Click { key: "a".into() }),
            step(105, ScriptEvent::Reply { key: "b".into() }),
            step(110, ScriptEvent::Delete { key: "c".into() }),
        ],
    };
    let report = run_replay(&deals(&["a", "b", "c"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    assert_eq!(report.published.len(), 2);
    let batch = &report.published[1];
    assert_eq!(batch.at_ms, 116);
    assert_eq!(batch.changes.len(), 3);
    assert_eq!(report.category("a"), Some(Category::Important));
    assert_eq!(report.category("b"), Some(Category::Priority));
    assert_eq!(report.category("c"), Some(Category::PendingDeletion));

    let buckets: Vec<Category> = report.buckets.iter().map(|b| b.category).collect();
    assert_eq!(
        buckets,
        vec![Category::Priority, Category::Important, Category::PendingDeletion]
    );
    assert_eq!(report.buckets[1].keys, vec![ItemKey::from("a")]);
}

/// 表示→退出→クリック
#[tokio::test(start_paused = true)]
async fn test_skip_candidate_then_click() {
    let script = Script {
        events: vec![
            step(0, ScriptEvent::Reconcile { keys: None }),
            step(50, ScriptEvent::Enter { keys: keys(&["b"]) }),
            step(300, ScriptEvent::Exit { keys: keys(&["b"]) }),
            step(500, ScriptEvent::Click { key: "b".into() }),
        ],
    };
    let report = run_replay(&deals(&["b"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    let categories: Vec<Category> = report
        .published
        .iter()
        .flat_map(|batch| batch.changes.iter().map(|c| c.category))
        .collect();
    assert_eq!(
        categories,
        vec![Category::Normal, Category::SkipCandidate, Category::Important]
    );
    assert_eq!(report.published[1].at_ms, 316);
}

/// 公開前に外されたアイテムの変更は公開されない
#[tokio::test(start_paused = true)]
async fn test_removed_item_is_not_published() {
    let script = Script {
        events: vec![
            step(0, ScriptEvent::Reconcile { keys: None }),
            step(100, ScriptEvent::Click { key: "a".into() }),
            step(105, ScriptEvent::Reconcile { keys: Some(keys(&["b"])) }),
        ],
    };
    let report = run_replay(&deals(&["a", "b"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    assert_eq!(report.published.len(), 1);
    assert!(report.category("a").is_none());
    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.categories[0].key, ItemKey::from("b"));
}

/// 破棄後のイベントは無視され、保留中の変更も公開されない
#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_flush() {
    let script = Script {
        events: vec![
            step(0, ScriptEvent::Reconcile { keys: None }),
            step(100, ScriptEvent::Click { key: "a".into() }),
            step(104, ScriptEvent::Teardown),
            step(200, ScriptEvent::Click { key: "a".into() }),
        ],
    };
    let report = run_replay(&deals(&["a"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    assert!(report.torn_down);
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.category("a"), None);
    assert!(report.buckets.is_empty());
}

/// 未知のキーへのイベントは無視として数える
#[tokio::test(start_paused = true)]
async fn test_unknown_keys_are_counted() {
    let script = Script::from_json(
        r#"{"events": [
            {"at": 0, "type": "reconcile", "keys": ["a", "missing"]},
            {"at": 20, "type": "click", "key": "ghost"},
            {"at": 30, "type": "enter", "keys": ["ghost"]}
        ]}"#,
    )
    .expect("パース失敗");
    let report = run_replay(&deals(&["a"]), script, FRAME, false)
        .await
        .expect("再生失敗");

    assert_eq!(report.events, 3);
    assert_eq!(report.ignored, 3);
    assert_eq!(report.category("a"), Some(Category::Normal));
}

/// テキスト出力にカテゴリ表示名が含まれる
#[tokio::test(start_paused = true)]
async fn test_render_text() {
    let script = Script {
        events: vec![
            step(0, ScriptEvent::Reconcile { keys: None }),
            step(40, ScriptEvent::Reply { key: "a".into() }),
        ],
    };
    let report = run_replay(&deals(&["a"]), script, FRAME, false)
        .await
        .expect("再生失敗");
    let text = report.render_text();
    assert!(text.contains("rev 2"));
    assert!(text.contains(Category::Priority.label()));
}
