//! 分類カテゴリ
//!
//! 各アイテムは常にちょうど1つのカテゴリに属する。初期値は `Normal`。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 分類カテゴリ（閉じた集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Priority,
    Important,
    #[default]
    Normal,
    SkipCandidate,
    PendingDeletion,
}

impl Category {
    /// 表示順（優先度の高い順）
    pub const ALL: [Category; 5] = [
        Category::Priority,
        Category::Important,
        Category::Normal,
        Category::SkipCandidate,
        Category::PendingDeletion,
    ];

    /// シリアライズ名と同じ識別子
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Priority => "priority",
            Category::Important => "important",
            Category::Normal => "normal",
            Category::SkipCandidate => "skip-candidate",
            Category::PendingDeletion => "pending-deletion",
        }
    }

    /// 画面表示用ラベル（サイトの表示言語に合わせる）
    pub fn label(&self) -> &'static str {
        match self {
            Category::Priority => "priorytet",
            Category::Important => "ważne",
            Category::Normal => "normalne",
            Category::SkipCandidate => "do pominięcia",
            Category::PendingDeletion => "do usunięcia",
        }
    }

    /// 表示順のランク（0が最上位）
    pub fn rank(&self) -> usize {
        match self {
            Category::Priority => 0,
            Category::Important => 1,
            Category::Normal => 2,
            Category::SkipCandidate => 3,
            Category::PendingDeletion => 4,
        }
    }

    /// 削除待ちは吸収状態
    pub fn is_terminal(&self) -> bool {
        matches!(self, Category::PendingDeletion)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.label() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}
