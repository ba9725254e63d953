//! インタラクション記録
//!
//! 記録の書き換えは台帳（`ledger`）だけが行う。外部には読み取り専用の
//! スナップショットのみを渡す。

use crate::category::Category;

/// アイテムごとのエンゲージメント記録
#[derive(Debug, Clone)]
pub struct InteractionRecord<T> {
    pub(crate) item: T,
    pub(crate) clicks: u32,
    pub(crate) replies: u32,
    pub(crate) deleted: bool,
    pub(crate) has_been_seen: bool,
    pub(crate) category: Category,
    /// 現在ビューポート内にあるか（入退出の遷移検出用、非公開）
    pub(crate) in_view: bool,
}

impl<T> InteractionRecord<T> {
    pub(crate) fn new(item: T) -> Self {
        Self {
            item,
            clicks: 0,
            replies: 0,
            deleted: false,
            has_been_seen: false,
            category: Category::Normal,
            in_view: false,
        }
    }

    /// 読み取り専用ビュー
    pub fn snapshot(&self) -> RecordSnapshot<'_, T> {
        RecordSnapshot {
            item: &self.item,
            clicks: self.clicks,
            replies: self.replies,
            deleted: self.deleted,
            has_been_seen: self.has_been_seen,
            category: self.category,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_in_view(&self) -> bool {
        self.in_view
    }
}

/// 記録の読み取り専用スナップショット
///
/// 上書きルールやUIに渡される。可変参照を持たないため記録は変更できない。
#[derive(Debug)]
pub struct RecordSnapshot<'a, T> {
    pub item: &'a T,
    pub clicks: u32,
    pub replies: u32,
    pub deleted: bool,
    pub has_been_seen: bool,
    pub category: Category,
}

impl<T> Clone for RecordSnapshot<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RecordSnapshot<'_, T> {}

impl<T> RecordSnapshot<'_, T> {
    /// クリックも返信もない
    pub fn is_unengaged(&self) -> bool {
        self.clicks == 0 && self.replies == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_fresh() {
        let record = InteractionRecord::new("deal");
        let snap = record.snapshot();
        assert_eq!(snap.clicks, 0);
        assert_eq!(snap.replies, 0);
        assert!(!snap.deleted);
        assert!(!snap.has_been_seen);
        assert_eq!(snap.category, Category::Normal);
        assert!(!record.is_in_view());
        assert_eq!(*snap.item, "deal");
    }

    #[test]
    fn test_unengaged() {
        let mut record = InteractionRecord::new(());
        assert!(record.snapshot().is_unengaged());
        record.replies = 1;
        assert!(!record.snapshot().is_unengaged());
    }
}
