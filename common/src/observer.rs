//! ビューポート監視の抽象化
//!
//! 描画層は追跡キーごとに `AttachHandle` を受け取り、アイテムのルート要素を
//! 結び付ける。分類器はバインド処理で要素ごとに `WatchToken` を払い出して
//! `ViewportObserver::watch` を呼ぶ。監視側はトークン単位で入退出をまとめて返す。
//!
//! 可視判定のしきい値: ビューポートとの交差が少しでもあれば「表示」
//! （最小面積・追加マージンなし）。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// 監視対象要素の識別トークン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchToken(u64);

impl WatchToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WatchToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(WatchToken)
    }
}

/// 可視状態の遷移1件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEntry {
    pub token: WatchToken,
    pub visible: bool,
}

impl VisibilityEntry {
    pub fn entered(token: WatchToken) -> Self {
        Self { token, visible: true }
    }

    pub fn exited(token: WatchToken) -> Self {
        Self { token, visible: false }
    }
}

/// ビューポート所属の監視機能
///
/// ブラウザの IntersectionObserver、ネイティブのウィンドウAPI、テスト用の
/// 手動実装などが実装する。通知はホストが `ListClassifier::handle_visibility`
/// にバッチ単位で渡す。
pub trait ViewportObserver {
    type Element: Clone + PartialEq;

    fn watch(&mut self, element: &Self::Element, token: WatchToken);
    fn unwatch(&mut self, element: &Self::Element, token: WatchToken);
    /// 全監視を停止
    fn disconnect(&mut self);
}

/// 描画層が要素を結び付けるハンドル
#[derive(Debug)]
pub struct AttachHandle<E> {
    slot: Rc<RefCell<Option<E>>>,
}

impl<E> Clone for AttachHandle<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<E> Default for AttachHandle<E> {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }
}

impl<E> AttachHandle<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 要素を結び付ける（マウント時）
    pub fn attach(&self, element: E) {
        *self.slot.borrow_mut() = Some(element);
    }

    /// 結び付けを外す（アンマウント時）
    pub fn detach(&self) {
        self.slot.borrow_mut().take();
    }

    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

impl<E: Clone> AttachHandle<E> {
    pub fn element(&self) -> Option<E> {
        self.slot.borrow().clone()
    }
}

/// 手動で入退出を発火させる監視実装
///
/// テストやCLIのリプレイで使う。要素は任意の比較可能な値（要素IDなど）。
#[derive(Debug, Clone)]
pub struct ManualViewport<E> {
    watched: Vec<(WatchToken, E)>,
    disconnected: bool,
}

impl<E> Default for ManualViewport<E> {
    fn default() -> Self {
        Self {
            watched: Vec::new(),
            disconnected: false,
        }
    }
}

impl<E: Clone + PartialEq> ManualViewport<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 監視中の要素のトークン
    pub fn token_of(&self, element: &E) -> Option<WatchToken> {
        self.watched
            .iter()
            .find(|(_, e)| e == element)
            .map(|(token, _)| *token)
    }

    pub fn is_watching(&self, element: &E) -> bool {
        self.token_of(element).is_some()
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// 要素群がビューポートに入ったバッチを作る（未監視の要素は含めない）
    pub fn enter(&self, elements: &[E]) -> Vec<VisibilityEntry> {
        self.batch(elements, true)
    }

    /// 要素群がビューポートから出たバッチを作る
    pub fn exit(&self, elements: &[E]) -> Vec<VisibilityEntry> {
        self.batch(elements, false)
    }

    fn batch(&self, elements: &[E], visible: bool) -> Vec<VisibilityEntry> {
        elements
            .iter()
            .filter_map(|e| self.token_of(e))
            .map(|token| VisibilityEntry { token, visible })
            .collect()
    }
}

impl<E: Clone + PartialEq> ViewportObserver for ManualViewport<E> {
    type Element = E;

    fn watch(&mut self, element: &E, token: WatchToken) {
        self.disconnected = false;
        self.watched.push((token, element.clone()));
    }

    fn unwatch(&mut self, _element: &E, token: WatchToken) {
        self.watched.retain(|(t, _)| *t != token);
    }

    fn disconnect(&mut self) {
        self.watched.clear();
        self.disconnected = true;
    }
}
