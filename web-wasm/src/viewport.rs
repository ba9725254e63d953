//! IntersectionObserver によるビューポート監視
//!
//! ルートはビューポート（null）、しきい値 0.0、マージン "0px"。
//! 監視トークンは要素の `data-watch-token` 属性に書き、コールバックで読み戻す。

use deal_scout_common::{Clock, ViewportObserver, VisibilityEntry, WatchToken};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

pub const WATCH_TOKEN_ATTR: &str = "data-watch-token";

pub struct IntersectionViewport {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

impl IntersectionViewport {
    /// 1回のコールバックで届いたエントリをまとめて `on_batch` に渡す
    pub fn new<F>(on_batch: F) -> Result<Self, JsValue>
    where
        F: Fn(Vec<VisibilityEntry>) + 'static,
    {
        let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                let batch: Vec<VisibilityEntry> = entries
                    .iter()
                    .filter_map(|value| {
                        let entry: IntersectionObserverEntry = value.dyn_into().ok()?;
                        let token: WatchToken =
                            entry.target().get_attribute(WATCH_TOKEN_ATTR)?.parse().ok()?;
                        Some(VisibilityEntry {
                            token,
                            visible: entry.is_intersecting(),
                        })
                    })
                    .collect();
                if !batch.is_empty() {
                    on_batch(batch);
                }
            },
        );

        let options = IntersectionObserverInit::new();
        options.set_root(None);
        options.set_root_margin("0px");
        options.set_threshold(&JsValue::from_f64(0.0));

        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)?;

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl ViewportObserver for IntersectionViewport {
    type Element = Element;

    fn watch(&mut self, element: &Element, token: WatchToken) {
        if let Err(e) = element.set_attribute(WATCH_TOKEN_ATTR, &token.to_string()) {
            web_sys::console::warn_2(&"watch: failed to tag element".into(), &e);
            return;
        }
        self.observer.observe(element);
    }

    fn unwatch(&mut self, element: &Element, _token: WatchToken) {
        self.observer.unobserve(element);
        let _ = element.remove_attribute(WATCH_TOKEN_ATTR);
    }

    fn disconnect(&mut self) {
        self.observer.disconnect();
    }
}

/// `performance.now()` による単調時刻（なければ `Date.now()`）
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
    origin: f64,
}

impl PerformanceClock {
    pub fn new() -> Self {
        let performance = web_sys::window().and_then(|w| w.performance());
        let origin = Self::read(performance.as_ref());
        Self { performance, origin }
    }

    fn read(performance: Option<&web_sys::Performance>) -> f64 {
        match performance {
            Some(p) => p.now(),
            None => js_sys::Date::now(),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> Duration {
        let elapsed_ms = (Self::read(self.performance.as_ref()) - self.origin).max(0.0);
        Duration::from_secs_f64(elapsed_ms / 1000.0)
    }
}

#[cfg(all(target_arch = "wasm32", test))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn card() -> Element {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .expect("document がない");
        let element = document.create_element("div").expect("要素作成失敗");
        document
            .body()
            .expect("body がない")
            .append_child(&element)
            .expect("追加失敗");
        element
    }

    #[wasm_bindgen_test]
    fn wasm_watch_tags_element_and_unwatch_clears() {
        let mut viewport = IntersectionViewport::new(|_| {}).expect("監視の作成失敗");
        let element = card();

        viewport.watch(&element, WatchToken::new(7));
        let token: WatchToken = element
            .get_attribute(WATCH_TOKEN_ATTR)
            .expect("属性がある")
            .parse()
            .expect("トークンとして読める");
        assert_eq!(token, WatchToken::new(7));

        viewport.unwatch(&element, WatchToken::new(7));
        assert!(element.get_attribute(WATCH_TOKEN_ATTR).is_none());
        viewport.disconnect();
    }

    #[wasm_bindgen_test]
    fn wasm_performance_clock_is_monotonic() {
        let clock = PerformanceClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
