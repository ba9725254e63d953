//! ディール一覧の検索・絞り込み・並べ替え
//!
//! 画面表示に依存しない部分のみ。検索語はタイトル・説明・価格の部分一致、
//! カテゴリ選択は複数可。表示モードごとにセクション数と件数の上限がある。

use crate::category::Category;
use crate::deals::Deal;
use crate::identity::{Identify, ItemKey};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// カテゴリ名 → ディール
pub type Sections = BTreeMap<String, Vec<Deal>>;

/// フィルタ欄に並べるカテゴリ数の上限
pub const CATEGORY_CHIP_LIMIT: usize = 15;

/// 全ディール数
pub fn total_deals(sections: &Sections) -> usize {
    sections.values().map(Vec::len).sum()
}

/// 選択可能なカテゴリ（昇順）
pub fn available_categories(sections: &Sections) -> Vec<String> {
    sections.keys().cloned().collect()
}

/// フィルタ欄に表示するカテゴリと、はみ出した件数
pub fn chip_categories(categories: &[String]) -> (&[String], usize) {
    let shown = categories.len().min(CATEGORY_CHIP_LIMIT);
    (&categories[..shown], categories.len() - shown)
}

/// 検索語とカテゴリ選択
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealFilter {
    pub query: String,
    pub selected: Vec<String>,
}

impl DealFilter {
    pub fn new(query: impl Into<String>, selected: Vec<String>) -> Self {
        Self {
            query: query.into(),
            selected,
        }
    }

    /// カテゴリの選択を切り替える
    pub fn toggle(&mut self, category: &str) {
        if let Some(pos) = self.selected.iter().position(|c| c == category) {
            self.selected.remove(pos);
        } else {
            self.selected.push(category.to_string());
        }
    }

    /// カテゴリ選択を解除
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, category: &str) -> bool {
        self.selected.iter().any(|c| c == category)
    }

    /// 小文字化・前後空白除去した検索語
    pub fn normalized_query(&self) -> String {
        self.query.trim().to_lowercase()
    }

    pub fn is_active(&self) -> bool {
        !self.selected.is_empty() || !self.normalized_query().is_empty()
    }
}

/// 検索語に一致するか（検索語は正規化済み）
fn matches_query(deal: &Deal, query: &str) -> bool {
    deal.title.to_lowercase().contains(query)
        || deal.description.to_lowercase().contains(query)
        || (!deal.price.is_empty() && deal.price.to_lowercase().contains(query))
}

/// 1カテゴリ分の表示データ
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    pub category: &'a str,
    pub deals: Vec<&'a Deal>,
    /// 件数上限で切り詰める前の件数
    pub total: usize,
}

impl Section<'_> {
    pub fn hidden_deals(&self) -> usize {
        self.total.saturating_sub(self.deals.len())
    }
}

/// 絞り込み
///
/// 検索語もカテゴリ選択もなければ全セクションをそのまま返す。
/// 一致するディールがなくなったセクションは除外する。
pub fn filter_sections<'a>(sections: &'a Sections, filter: &DealFilter) -> Vec<Section<'a>> {
    let query = filter.normalized_query();
    let has_query = !query.is_empty();
    let has_categories = !filter.selected.is_empty();

    sections
        .iter()
        .filter(|(category, _)| !has_categories || filter.is_selected(category))
        .filter_map(|(category, deals)| {
            let deals: Vec<&Deal> = if has_query {
                deals.iter().filter(|d| matches_query(d, &query)).collect()
            } else {
                deals.iter().collect()
            };
            if has_query && deals.is_empty() {
                return None;
            }
            Some(Section {
                category: category.as_str(),
                total: deals.len(),
                deals,
            })
        })
        .collect()
}

/// 表示モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    /// 一度に表示するセクション数
    pub fn section_limit(&self) -> usize {
        match self {
            ViewMode::List => 12,
            ViewMode::Grid => 8,
        }
    }

    /// 1セクションあたりの表示件数
    pub fn deals_per_section(&self) -> usize {
        match self {
            ViewMode::List => 6,
            ViewMode::Grid => 12,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ViewMode::List => ViewMode::Grid,
            ViewMode::Grid => ViewMode::List,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::List => "list",
            ViewMode::Grid => "grid",
        })
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(ViewMode::List),
            "grid" => Ok(ViewMode::Grid),
            other => Err(format!("unknown view mode: {} (list/grid)", other)),
        }
    }
}

/// セクション内の並び順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Original,
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Original => "original",
            SortOrder::Newest => "newest",
            SortOrder::PriceAsc => "price-asc",
            SortOrder::PriceDesc => "price-desc",
            SortOrder::Title => "title",
        })
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "original" => Ok(SortOrder::Original),
            "newest" => Ok(SortOrder::Newest),
            "price-asc" => Ok(SortOrder::PriceAsc),
            "price-desc" => Ok(SortOrder::PriceDesc),
            "title" => Ok(SortOrder::Title),
            other => Err(format!(
                "unknown sort order: {} (original/newest/price-asc/price-desc/title)",
                other
            )),
        }
    }
}

/// 価格文字列をグロシュ単位に変換（"1 299,99 zł" → 129999）
///
/// "Za darmo" / "free" は 0。数値が見つからなければ `None`。
pub fn parse_price(price: &str) -> Option<u64> {
    lazy_static::lazy_static! {
        static ref PRICE_RE: Regex = Regex::new(r"(\d[\d\s\u{00a0}.]*\d|\d)(?:,(\d{1,2}))?").unwrap();
    }

    let lower = price.trim().to_lowercase();
    if lower.contains("za darmo") || lower.contains("darmowe") || lower == "free" {
        return Some(0);
    }

    let caps = PRICE_RE.captures(&lower)?;
    let whole: String = caps.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
    let whole: u64 = whole.parse().ok()?;
    let fraction = match caps.get(2).map(|m| m.as_str()) {
        Some(f) if f.len() == 1 => f.parse::<u64>().ok()? * 10,
        Some(f) => f.parse::<u64>().ok()?,
        None => 0,
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

fn parse_created_at(deal: &Deal) -> Option<chrono::NaiveDateTime> {
    let raw = deal.created_at.as_deref()?.trim();
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// 値のないものを末尾に送る比較
fn cmp_missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// セクション内の並べ替え（安定ソート）
pub fn sort_deals(deals: &mut [&Deal], order: SortOrder) {
    match order {
        SortOrder::Original => {}
        SortOrder::Newest => deals.sort_by(|a, b| {
            cmp_missing_last(
                parse_created_at(a).map(std::cmp::Reverse),
                parse_created_at(b).map(std::cmp::Reverse),
            )
        }),
        SortOrder::PriceAsc => {
            deals.sort_by(|a, b| cmp_missing_last(parse_price(&a.price), parse_price(&b.price)))
        }
        SortOrder::PriceDesc => deals.sort_by(|a, b| {
            cmp_missing_last(
                parse_price(&a.price).map(std::cmp::Reverse),
                parse_price(&b.price).map(std::cmp::Reverse),
            )
        }),
        SortOrder::Title => deals.sort_by_key(|d| d.title.to_lowercase()),
    }
}

/// 表示ページ（上限適用後）
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPage<'a> {
    pub sections: Vec<Section<'a>>,
    /// 上限で表示しなかったセクション数
    pub hidden_sections: usize,
}

/// 並べ替えと表示上限の適用
///
/// セクションはカテゴリ名順、件数は表示モードの上限まで。
pub fn paginate<'a>(
    mut sections: Vec<Section<'a>>,
    mode: ViewMode,
    order: SortOrder,
) -> SectionPage<'a> {
    sections.sort_by(|a, b| a.category.cmp(b.category));

    let hidden_sections = sections.len().saturating_sub(mode.section_limit());
    sections.truncate(mode.section_limit());

    for section in &mut sections {
        sort_deals(&mut section.deals, order);
        section.deals.truncate(mode.deals_per_section());
    }

    SectionPage {
        sections,
        hidden_sections,
    }
}

/// 分類器のカテゴリごとにディールをまとめる（表示順、空のカテゴリは除く）
///
/// 追跡されていないディール（キーなし・未公開）は含めない。
pub fn group_by_bucket<'a>(
    deals: &'a [Deal],
    categories: &HashMap<ItemKey, Category>,
) -> Vec<(Category, Vec<&'a Deal>)> {
    let mut buckets: Vec<(Category, Vec<&'a Deal>)> =
        Category::ALL.iter().map(|c| (*c, Vec::new())).collect();

    for deal in deals {
        let Some(category) = deal.item_key().and_then(|key| categories.get(&key)) else {
            continue;
        };
        buckets[category.rank()].1.push(deal);
    }

    buckets.retain(|(_, deals)| !deals.is_empty());
    buckets
}
