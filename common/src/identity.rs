//! アイテム識別子
//!
//! 再レンダリングをまたいで安定したキー。取得できないアイテムは追跡対象外。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// アイテムキー（文字列または整数）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Int(n) => write!(f, "{}", n),
            ItemKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ItemKey {
    fn from(s: &str) -> Self {
        ItemKey::Str(s.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(s: String) -> Self {
        ItemKey::Str(s)
    }
}

impl From<i64> for ItemKey {
    fn from(n: i64) -> Self {
        ItemKey::Int(n)
    }
}

impl From<i32> for ItemKey {
    fn from(n: i32) -> Self {
        ItemKey::Int(i64::from(n))
    }
}

/// 既定の識別子取得（慣習的な `id` フィールド）
pub trait Identify {
    fn item_key(&self) -> Option<ItemKey>;
}

impl Identify for serde_json::Value {
    fn item_key(&self) -> Option<ItemKey> {
        match self.get("id")? {
            serde_json::Value::String(s) if !s.is_empty() => Some(ItemKey::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(ItemKey::Int),
            _ => None,
        }
    }
}

impl Identify for ItemKey {
    fn item_key(&self) -> Option<ItemKey> {
        Some(self.clone())
    }
}

/// 呼び出し側が指定する識別子抽出関数
pub type IdentityExtractor<T> = Rc<dyn Fn(&T) -> Option<ItemKey>>;

/// `Identify` 実装を使う既定の抽出関数
pub fn default_extractor<T: Identify + 'static>() -> IdentityExtractor<T> {
    Rc::new(|item: &T| item.item_key())
}
