//! ブラウザ上の分類器ホスト
//!
//! 分類器の2つの遅延処理をブラウザのプリミティブで実行する:
//! - バインド処理: requestAnimationFrame（gloo render）
//! - フラッシュ: setTimeout（gloo Timeout）
//!
//! ホストを破棄すると両方が取り消され、分類器も破棄される。

use crate::viewport::{IntersectionViewport, PerformanceClock};
use deal_scout_common::{
    Category, ClassifierOptions, Clock, Deal, ItemKey, ListClassifier, VisibilityEntry,
};
use gloo::render::{request_animation_frame, AnimationFrame};
use gloo::timers::callback::Timeout;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::JsValue;
use web_sys::Element;

type Classifier = ListClassifier<Deal, IntersectionViewport>;

/// 公開のたびに呼ばれる（公開済みカテゴリ全体, 版数）
pub type PublishListener = Rc<dyn Fn(HashMap<ItemKey, Category>, u64)>;

struct HostState {
    classifier: Classifier,
    bind_frame: Option<AnimationFrame>,
    flush_timer: Option<Timeout>,
    clock: Rc<PerformanceClock>,
    on_publish: PublishListener,
}

/// 分類器と遅延処理のハンドル
pub struct ClassifierHost {
    state: Rc<RefCell<HostState>>,
}

impl ClassifierHost {
    pub fn new(flush_delay: Duration, on_publish: PublishListener) -> Result<Self, JsValue> {
        let slot: Rc<RefCell<Weak<RefCell<HostState>>>> = Rc::new(RefCell::new(Weak::new()));

        let batch_slot = Rc::clone(&slot);
        let viewport = IntersectionViewport::new(move |batch: Vec<VisibilityEntry>| {
            let state = batch_slot.borrow().upgrade();
            if let Some(state) = state {
                state.borrow_mut().classifier.handle_visibility(&batch);
                Self::pump(&state);
            }
        })?;

        let options = ClassifierOptions::<Deal>::default()
            .flush_delay(flush_delay)
            .on_override_error(|key, error| {
                web_sys::console::warn_1(&format!("override rule failed for {}: {}", key, error).into());
            });
        let clock = Rc::new(PerformanceClock::new());
        let classifier = ListClassifier::new(options, viewport, Rc::clone(&clock) as Rc<dyn Clock>);

        let state = Rc::new(RefCell::new(HostState {
            classifier,
            bind_frame: None,
            flush_timer: None,
            clock,
            on_publish,
        }));
        *slot.borrow_mut() = Rc::downgrade(&state);

        Ok(Self { state })
    }

    /// 描画リストとの突き合わせ
    ///
    /// 消えたアイテムは公開マップから即座に外れるので、その場合は
    /// フラッシュを待たずにリスナーへ通知する。
    pub fn reconcile(&self, deals: &[Deal]) {
        let unpublished = {
            let mut s = self.state.borrow_mut();
            let before = s.classifier.revision();
            s.classifier.reconcile(deals);
            let revision = s.classifier.revision();
            (revision != before).then(|| {
                (s.classifier.categories().clone(), revision, Rc::clone(&s.on_publish))
            })
        };
        if let Some((categories, revision, listener)) = unpublished {
            listener(categories, revision);
        }
        Self::pump(&self.state);
    }

    /// カードのルート要素を結び付け、次フレームで監視に登録する
    pub fn attach(&self, key: &ItemKey, element: Element) {
        let handle = self.state.borrow().classifier.handle(key);
        if let Some(handle) = handle {
            if handle.element().as_ref() != Some(&element) {
                handle.attach(element);
                Self::request_bind(&self.state);
            }
        }
    }

    /// カードのアンマウント
    pub fn detach(&self, key: &ItemKey) {
        let handle = self.state.borrow().classifier.handle(key);
        if let Some(handle) = handle {
            handle.detach();
            Self::request_bind(&self.state);
        }
    }

    pub fn click(&self, key: &ItemKey) {
        self.state.borrow_mut().classifier.on_click(key);
        Self::pump(&self.state);
    }

    pub fn reply(&self, key: &ItemKey) {
        self.state.borrow_mut().classifier.on_reply(key);
        Self::pump(&self.state);
    }

    pub fn delete(&self, key: &ItemKey) {
        self.state.borrow_mut().classifier.on_delete(key);
        Self::pump(&self.state);
    }

    /// 遅延処理を取り消して分類器を破棄する
    pub fn teardown(&self) {
        let mut state = self.state.borrow_mut();
        state.bind_frame = None;
        state.flush_timer = None;
        state.classifier.teardown();
    }

    /// 分類器が出した遅延処理の要求をブラウザのコールバックに載せる
    fn pump(state: &Rc<RefCell<HostState>>) {
        let (bind, flush) = {
            let mut s = state.borrow_mut();
            (s.classifier.take_bind_request(), s.classifier.take_flush_request())
        };
        if bind {
            Self::request_bind(state);
        }
        if let Some(delay) = flush {
            Self::arm_flush(state, delay);
        }
    }

    fn request_bind(state: &Rc<RefCell<HostState>>) {
        let mut s = state.borrow_mut();
        if s.bind_frame.is_some() || s.classifier.is_torn_down() {
            return;
        }
        let weak = Rc::downgrade(state);
        s.bind_frame = Some(request_animation_frame(move |_timestamp| {
            let Some(state) = weak.upgrade() else { return };
            {
                let mut s = state.borrow_mut();
                s.bind_frame = None;
                s.classifier.run_bind_pass();
            }
            Self::pump(&state);
        }));
    }

    fn arm_flush(state: &Rc<RefCell<HostState>>, delay: Duration) {
        let weak = Rc::downgrade(state);
        let millis = delay.as_millis().clamp(1, u32::MAX as u128) as u32;
        state.borrow_mut().flush_timer = Some(Timeout::new(millis, move || {
            if let Some(state) = weak.upgrade() {
                Self::flush(&state);
            }
        }));
    }

    fn flush(state: &Rc<RefCell<HostState>>) {
        let (published, listener, remaining) = {
            let mut s = state.borrow_mut();
            s.flush_timer = None;
            let published = s
                .classifier
                .poll()
                .map(|p| (s.classifier.categories().clone(), p.revision));
            // タイマーが期限より早く発火した場合は残り時間で再予約
            let now = s.clock.now();
            let remaining = s.classifier.next_flush_at().map(|at| at.saturating_sub(now));
            (published, Rc::clone(&s.on_publish), remaining)
        };

        if let Some((categories, revision)) = published {
            listener(categories, revision);
        }
        if let Some(remaining) = remaining {
            Self::arm_flush(state, remaining);
        }
    }
}

impl Drop for ClassifierHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(all(target_arch = "wasm32", test))]
mod wasm_tests {
    use super::*;
    use deal_scout_common::FRAME_DELAY;
    use gloo::timers::future::TimeoutFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    type Log = Rc<RefCell<Vec<(HashMap<ItemKey, Category>, u64)>>>;

    fn host() -> (ClassifierHost, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let listener: PublishListener = Rc::new(move |categories: HashMap<ItemKey, Category>, revision: u64| {
            sink.borrow_mut().push((categories, revision))
        });
        let host = ClassifierHost::new(FRAME_DELAY, listener).expect("ホスト作成失敗");
        (host, log)
    }

    fn deals(ids: &[&str]) -> Vec<Deal> {
        ids.iter()
            .map(|id| Deal {
                id: Some(id.to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[wasm_bindgen_test]
    async fn wasm_flush_timer_publishes_initial_categories() {
        let (host, log) = host();
        host.reconcile(&deals(&["a", "b"]));
        assert!(log.borrow().is_empty());

        TimeoutFuture::new(60).await;
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, 1);
        assert_eq!(log[0].0.get(&ItemKey::from("a")), Some(&Category::Normal));
    }

    #[wasm_bindgen_test]
    async fn wasm_removal_notifies_without_waiting() {
        let (host, log) = host();
        host.reconcile(&deals(&["a", "b"]));
        TimeoutFuture::new(60).await;

        host.reconcile(&deals(&["b"]));
        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].1, 2);
        assert!(!log[1].0.contains_key(&ItemKey::from("a")));
    }

    #[wasm_bindgen_test]
    async fn wasm_early_flush_rearms_timer() {
        let (host, log) = host();
        host.reconcile(&deals(&["a"]));

        // 期限前の発火は公開せず、残り時間で再予約する
        ClassifierHost::flush(&host.state);
        assert!(log.borrow().is_empty());
        assert!(host.state.borrow().flush_timer.is_some());

        TimeoutFuture::new(60).await;
        assert_eq!(log.borrow().len(), 1);
    }

    #[wasm_bindgen_test]
    async fn wasm_click_publishes_on_next_flush() {
        let (host, log) = host();
        host.reconcile(&deals(&["a"]));
        TimeoutFuture::new(60).await;

        host.click(&ItemKey::from("a"));
        TimeoutFuture::new(60).await;
        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].0.get(&ItemKey::from("a")), Some(&Category::Important));
    }

    #[wasm_bindgen_test]
    async fn wasm_drop_cancels_pending_flush() {
        let (host, log) = host();
        host.reconcile(&deals(&["a"]));
        drop(host);

        TimeoutFuture::new(60).await;
        assert!(log.borrow().is_empty());
    }
}
