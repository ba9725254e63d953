//! インタラクションスクリプトの再生
//!
//! スクリプトのイベントをフィーダータスクが時刻どおりにチャネルへ送り、
//! シングルスレッドのループが分類器を所有して処理する。ループはチャネルと
//! フラッシュ期限の `sleep_until` を `select!` で待つ。
//!
//! スクリプト形式:
//! ```json
//! {"events": [
//!   {"at": 0,   "type": "reconcile"},
//!   {"at": 100, "type": "enter", "keys": ["a", "b"]},
//!   {"at": 400, "type": "exit",  "keys": ["b"]},
//!   {"at": 500, "type": "click", "key": "a"}
//! ]}
//! ```

use crate::error::{DealScoutError, Result};
use deal_scout_common::{
    Category, ClassifierOptions, Clock, Deal, Identify, ItemKey, ListClassifier, ManualViewport,
    Published,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// スクリプトの1イベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ScriptEvent {
    /// 描画リストの更新（キー省略時はスナップショット全件）
    Reconcile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keys: Option<Vec<String>>,
    },
    Enter { keys: Vec<String> },
    Exit { keys: Vec<String> },
    Click { key: String },
    Reply { key: String },
    Delete { key: String },
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// 開始からの経過（ミリ秒）
    pub at: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub events: Vec<ScriptStep>,
}

impl Script {
    /// JSON文字列から読み込み（時刻順に安定ソート）
    pub fn from_json(json: &str) -> Result<Self> {
        let mut script: Script = serde_json::from_str(json)
            .map_err(|e| DealScoutError::InvalidScript(e.to_string()))?;
        script.events.sort_by_key(|step| step.at);
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// 1回の公開（出力用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedBatch {
    pub revision: u64,
    pub at_ms: u64,
    pub changes: Vec<CategoryChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChange {
    pub key: ItemKey,
    pub category: Category,
}

impl From<Published> for PublishedBatch {
    fn from(published: Published) -> Self {
        Self {
            revision: published.revision,
            at_ms: published.at.as_millis() as u64,
            changes: published
                .changes
                .into_iter()
                .map(|(key, category)| CategoryChange { key, category })
                .collect(),
        }
    }
}

/// 分類ごとのキー（描画リスト順）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub category: Category,
    pub keys: Vec<ItemKey>,
}

/// 再生結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub published: Vec<PublishedBatch>,
    /// 最終的な公開カテゴリ（キー順）
    pub categories: Vec<CategoryChange>,
    /// 空でない分類のみ（表示順）
    pub buckets: Vec<Bucket>,
    pub events: usize,
    /// 対象が見つからず無視したイベント数
    pub ignored: usize,
    pub torn_down: bool,
}

impl ReplayReport {
    pub fn category(&self, key: &str) -> Option<Category> {
        let key = ItemKey::from(key);
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.category)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for batch in &self.published {
            out.push_str(&format!("[{:>6}ms] rev {}\n", batch.at_ms, batch.revision));
            for change in &batch.changes {
                out.push_str(&format!("    {} → {}\n", change.key, change.category));
            }
        }
        out.push_str(&format!(
            "\nイベント: {}件（無視: {}件） / 公開: {}回{}\n",
            self.events,
            self.ignored,
            self.published.len(),
            if self.torn_down { " / 破棄済み" } else { "" }
        ));
        for change in &self.categories {
            out.push_str(&format!("  {:<20} {}\n", change.key.to_string(), change.category.label()));
        }
        for bucket in &self.buckets {
            let keys: Vec<String> = bucket.keys.iter().map(ToString::to_string).collect();
            out.push_str(&format!("■ {}: {}\n", bucket.category.label(), keys.join(", ")));
        }
        out
    }
}

/// tokio の単調時刻による時計（一時停止した時間でも進む）
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new(start: Instant) -> Self {
        Self { start }
    }

    pub fn start(&self) -> Instant {
        self.start
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start)
    }
}

type ReplayClassifier = ListClassifier<Deal, ManualViewport<String>>;

/// カード要素の識別子
fn card_id(key: &ItemKey) -> String {
    format!("card-{}", key)
}

/// 描画中のカード（キー → ディール）
struct Renderer {
    deals: HashMap<ItemKey, Deal>,
    order: Vec<ItemKey>,
}

impl Renderer {
    fn new(deals: &[Deal]) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for deal in deals {
            if let Some(key) = deal.item_key() {
                if !map.contains_key(&key) {
                    order.push(key.clone());
                    map.insert(key, deal.clone());
                }
            }
        }
        Self { deals: map, order }
    }

    /// 描画するディールを選ぶ（キー省略時は全件）
    fn select(&self, keys: Option<&[String]>) -> (Vec<Deal>, usize) {
        match keys {
            None => (
                self.order.iter().filter_map(|k| self.deals.get(k)).cloned().collect(),
                0,
            ),
            Some(keys) => {
                let mut missing = 0;
                let deals = keys
                    .iter()
                    .filter_map(|k| {
                        let found = self.deals.get(&ItemKey::from(k.as_str())).cloned();
                        if found.is_none() {
                            warn!(key = %k, "reconcile key not in snapshot");
                            missing += 1;
                        }
                        found
                    })
                    .collect();
                (deals, missing)
            }
        }
    }
}

/// 次フレームのバインド処理（描画済みカードを結び付けてから登録）
fn bind_frame(classifier: &mut ReplayClassifier) {
    if !classifier.take_bind_request() {
        return;
    }
    for (key, handle) in classifier.handles() {
        if !handle.is_attached() {
            handle.attach(card_id(key));
        }
    }
    classifier.run_bind_pass();
}

/// 1イベントを処理する。対象が見つからなければ false
fn apply(classifier: &mut ReplayClassifier, renderer: &Renderer, event: &ScriptEvent) -> bool {
    match event {
        ScriptEvent::Reconcile { keys } => {
            let (deals, missing) = renderer.select(keys.as_deref());
            classifier.reconcile(&deals);
            missing == 0
        }
        ScriptEvent::Enter { keys } | ScriptEvent::Exit { keys } => {
            let elements: Vec<String> = keys
                .iter()
                .map(|k| card_id(&ItemKey::from(k.as_str())))
                .collect();
            let batch = match event {
                ScriptEvent::Enter { .. } => classifier.observer().enter(&elements),
                _ => classifier.observer().exit(&elements),
            };
            let matched = batch.len() == elements.len();
            classifier.handle_visibility(&batch);
            matched
        }
        ScriptEvent::Click { key } => classifier.on_click(&ItemKey::from(key.as_str())),
        ScriptEvent::Reply { key } => classifier.on_reply(&ItemKey::from(key.as_str())),
        ScriptEvent::Delete { key } => classifier.on_delete(&ItemKey::from(key.as_str())),
        ScriptEvent::Teardown => {
            classifier.teardown();
            true
        }
    }
}

/// スクリプトのイベントを時刻どおりに送る
async fn feed(steps: Vec<ScriptStep>, start: Instant, tx: mpsc::Sender<ScriptStep>) {
    for step in steps {
        sleep_until(start + Duration::from_millis(step.at)).await;
        if tx.send(step).await.is_err() {
            break;
        }
    }
}

/// スクリプトを再生する
///
/// 分類器は `Rc` を含むためこのFutureは `Send` ではない。
/// `#[tokio::main]` 直下や `current_thread` ランタイムで待つこと。
pub async fn run_replay(
    deals: &[Deal],
    script: Script,
    flush_delay: Duration,
    progress: bool,
) -> Result<ReplayReport> {
    let start = Instant::now();
    let clock = TokioClock::new(start);
    let options = ClassifierOptions::<Deal>::default().flush_delay(flush_delay);
    let mut classifier: ReplayClassifier =
        ListClassifier::new(options, ManualViewport::new(), Rc::new(clock));
    let renderer = Renderer::new(deals);

    let bar = if progress {
        let bar = ProgressBar::new(script.events.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut report = ReplayReport {
        events: script.events.len(),
        ..Default::default()
    };

    let (tx, mut rx) = mpsc::channel(32);
    let feeder = tokio::spawn(feed(script.events, start, tx));

    loop {
        let deadline = classifier.next_flush_at().map(|at| start + at);
        tokio::select! {
            biased;
            _ = sleep_until(deadline.unwrap_or(start)), if deadline.is_some() => {
                if let Some(published) = classifier.poll() {
                    bar.set_message(format!("rev {}", published.revision));
                    report.published.push(published.into());
                }
            }
            step = rx.recv() => {
                let Some(step) = step else { break };
                debug!(at = step.at, event = ?step.event, "replay event");
                if !apply(&mut classifier, &renderer, &step.event) {
                    report.ignored += 1;
                }
                bind_frame(&mut classifier);
                if let Some(delay) = classifier.take_flush_request() {
                    debug!(?delay, "flush armed");
                }
                bar.inc(1);
            }
        }
    }

    // 残りの公開待ちを期限どおりに流す
    while let Some(at) = classifier.next_flush_at() {
        sleep_until(start + at).await;
        if let Some(published) = classifier.poll() {
            report.published.push(published.into());
        }
    }

    if let Err(e) = feeder.await {
        warn!(error = %e, "script feeder stopped");
    }
    bar.finish_and_clear();

    let mut categories: Vec<CategoryChange> = classifier
        .categories()
        .iter()
        .map(|(key, category)| CategoryChange {
            key: key.clone(),
            category: *category,
        })
        .collect();
    categories.sort_by(|a, b| a.key.cmp(&b.key));
    report.categories = categories;
    report.buckets = Category::ALL
        .iter()
        .map(|category| Bucket {
            category: *category,
            keys: classifier.keys_in(*category),
        })
        .filter(|bucket| !bucket.keys.is_empty())
        .collect();
    report.torn_down = classifier.is_torn_down();

    info!(
        events = report.events,
        published = report.published.len(),
        "replay finished"
    );
    Ok(report)
}
