//! 対話式の分類確認
//!
//! スナップショットのディールを1件ずつ表示し、表示・スクロール・クリック・
//! 返信・削除を入力させて分類の変化を確認する。1操作を1フレームとみなし、
//! 操作ごとに即時フラッシュする。

use crate::error::Result;
use deal_scout_common::{
    group_by_bucket, Category, ClassifierOptions, Deal, Identify, ItemKey, ListClassifier,
    ManualClock, ManualViewport, Published,
};
use dialoguer::Input;
use std::rc::Rc;
use std::time::Duration;

/// 対話アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// ビューポートに入る
    View,
    /// スクロールして通り過ぎる
    ScrollPast,
    Click,
    Reply,
    Delete,
    /// 次のディールへ
    Next,
    /// 前のディールへ
    Prev,
    /// 終了
    Quit,
}

impl SessionAction {
    /// 入力文字列を解釈（不明な入力は `None`）
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "v" => Some(SessionAction::View),
            "x" => Some(SessionAction::ScrollPast),
            "c" => Some(SessionAction::Click),
            "r" => Some(SessionAction::Reply),
            "d" => Some(SessionAction::Delete),
            "" | "n" => Some(SessionAction::Next),
            "p" => Some(SessionAction::Prev),
            "q" | "Q" => Some(SessionAction::Quit),
            _ => None,
        }
    }
}

/// 分類器とその描画状態
pub struct Session {
    deals: Vec<Deal>,
    keys: Vec<ItemKey>,
    classifier: ListClassifier<Deal, ManualViewport<String>>,
    clock: ManualClock,
    frame: Duration,
}

impl Session {
    /// 追跡できるディールだけで作成し、全カードを描画済みにする
    pub fn new(deals: Vec<Deal>, frame: Duration) -> Self {
        let clock = ManualClock::new();
        let options = ClassifierOptions::<Deal>::default().flush_delay(frame);
        let mut classifier = ListClassifier::new(options, ManualViewport::new(), Rc::new(clock.clone()));

        classifier.reconcile(&deals);
        let keys = classifier.tracked().to_vec();
        let deals = deals.into_iter().filter(|d| d.item_key().is_some()).collect();

        let mut session = Self {
            deals,
            keys,
            classifier,
            clock,
            frame,
        };
        session.end_frame();
        session
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&ItemKey> {
        self.keys.get(index)
    }

    pub fn deal(&self, key: &ItemKey) -> Option<&Deal> {
        self.deals.iter().find(|d| d.item_key().as_ref() == Some(key))
    }

    pub fn category(&self, key: &ItemKey) -> Option<Category> {
        self.classifier.category(key)
    }

    /// ディールに対する操作を適用し、フレームを終える
    pub fn apply(&mut self, key: &ItemKey, action: SessionAction) -> Option<Published> {
        let element = format!("card-{}", key);
        match action {
            SessionAction::View => {
                let batch = self.classifier.observer().enter(&[element]);
                self.classifier.handle_visibility(&batch);
            }
            SessionAction::ScrollPast => {
                let batch = self.classifier.observer().exit(&[element]);
                self.classifier.handle_visibility(&batch);
            }
            SessionAction::Click => {
                self.classifier.on_click(key);
            }
            SessionAction::Reply => {
                self.classifier.on_reply(key);
            }
            SessionAction::Delete => {
                self.classifier.on_delete(key);
            }
            SessionAction::Next | SessionAction::Prev | SessionAction::Quit => return None,
        }
        self.end_frame()
    }

    /// バインド処理とフラッシュを済ませて時刻を1フレーム進める
    fn end_frame(&mut self) -> Option<Published> {
        if self.classifier.take_bind_request() {
            for (key, handle) in self.classifier.handles() {
                if !handle.is_attached() {
                    handle.attach(format!("card-{}", key));
                }
            }
            self.classifier.run_bind_pass();
        }
        self.classifier.take_flush_request();
        self.clock.advance(self.frame);
        self.classifier.flush_now()
    }

    /// 分類ごとのディール（表示順）
    pub fn summary(&self) -> Vec<(Category, Vec<&Deal>)> {
        group_by_bucket(&self.deals, self.classifier.categories())
    }
}

/// 対話式セッションを実行
pub fn run_interactive_session(deals: Vec<Deal>, frame: Duration) -> Result<()> {
    let mut session = Session::new(deals, frame);

    if session.is_empty() {
        println!("✓ 追跡できるディールがありません");
        return Ok(());
    }

    println!("🏷 ディール: {}件", session.len());
    println!("---");
    println!("操作: [v]表示 [x]通過 [c]クリック [r]返信 [d]削除 [Enter/n]次 [p]前 [q]終了");
    println!("---\n");

    let mut index = 0;
    while let Some(key) = session.key(index).cloned() {
        let title = session.deal(&key).map(|d| d.title.clone()).unwrap_or_default();
        let category = session.category(&key).unwrap_or_default();
        println!("[{}/{}] {} ({})", index + 1, session.len(), title, category.label());

        let input: String = Input::new()
            .with_prompt("操作")
            .allow_empty(true)
            .interact_text()?;

        let Some(action) = SessionAction::parse(&input) else {
            println!("  → 不明な操作です\n");
            continue;
        };

        match action {
            SessionAction::Next => index += 1,
            SessionAction::Prev => index = index.saturating_sub(1),
            SessionAction::Quit => break,
            _ => {
                let published = session.apply(&key, action);
                let category = session.category(&key).unwrap_or_default();
                match published {
                    Some(p) => println!("  → {} (rev {})\n", category.label(), p.revision),
                    None => println!("  → {} (変化なし)\n", category.label()),
                }
            }
        }
    }

    println!("\n分類結果:");
    for (category, deals) in session.summary() {
        println!("  {} ({}件)", category.label(), deals.len());
        for deal in deals {
            println!("    - {}", deal.title);
        }
    }

    Ok(())
}
