//! 分類ルール
//!
//! 評価順（最初に一致したルールを採用）:
//! 1. 削除済み → pending-deletion
//! 2. 返信1件以上 または クリック3回以上 → priority
//! 3. クリック1回以上 → important
//! 4. 閲覧済みでエンゲージメントなし → skip-candidate
//! 5. それ以外 → normal
//!
//! ルール結果のあとに呼び出し側の上書きルールを適用する。削除済みの記録には
//! 上書きを適用しない（pending-deletion は吸収状態）。

use crate::category::Category;
use crate::record::RecordSnapshot;
use std::rc::Rc;
use thiserror::Error;

/// priority に昇格するクリック数
pub const PRIORITY_CLICKS: u32 = 3;

/// 上書きルールの失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("override rule failed: {0}")]
pub struct OverrideError(pub String);

impl OverrideError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 呼び出し側が指定する上書きルール
///
/// `Ok(None)` ならルール結果をそのまま使う。
pub type OverrideRule<T> =
    Rc<dyn Fn(&RecordSnapshot<'_, T>) -> Result<Option<Category>, OverrideError>>;

/// ルールによる分類（純関数）
pub fn classify<T>(record: &RecordSnapshot<'_, T>) -> Category {
    if record.deleted {
        Category::PendingDeletion
    } else if record.replies >= 1 || record.clicks >= PRIORITY_CLICKS {
        Category::Priority
    } else if record.clicks >= 1 {
        Category::Important
    } else if record.has_been_seen && record.is_unengaged() {
        Category::SkipCandidate
    } else {
        Category::Normal
    }
}

/// 上書き適用後の分類結果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub category: Category,
    pub rule_based: Category,
    /// 上書きルールが失敗した場合のエラー（ルール結果にフォールバック済み）
    pub error: Option<OverrideError>,
}

/// ルール分類＋上書きルール
///
/// 上書きが失敗した場合はルール結果を採用し、エラーを返り値に載せる。
pub fn resolve<T>(
    record: &RecordSnapshot<'_, T>,
    override_rule: Option<&OverrideRule<T>>,
) -> Resolution {
    let rule_based = classify(record);

    let Some(rule) = override_rule else {
        return Resolution { category: rule_based, rule_based, error: None };
    };
    if rule_based.is_terminal() {
        return Resolution { category: rule_based, rule_based, error: None };
    }

    match rule(record) {
        Ok(Some(category)) => Resolution { category, rule_based, error: None },
        Ok(None) => Resolution { category: rule_based, rule_based, error: None },
        Err(e) => Resolution { category: rule_based, rule_based, error: Some(e) },
    }
}
