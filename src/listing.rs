//! スナップショットの読み込みと一覧表示
//!
//! Webフロントエンドと同じ絞り込み・並べ替え・表示上限をCLIで再現する。

use crate::config::OutputFormat;
use crate::error::{DealScoutError, Result};
use deal_scout_common::catalog::{available_categories, chip_categories, total_deals};
use deal_scout_common::{
    filter_sections, paginate, DealFilter, DealSnapshot, Error as CommonError, SectionPage,
    Sections, SortOrder, ViewMode,
};
use serde::Serialize;
use std::path::Path;

/// スナップショットファイルを読み込む
pub fn load_snapshot(path: &Path) -> Result<DealSnapshot> {
    if !path.exists() {
        return Err(DealScoutError::SnapshotNotFound(path.display().to_string()));
    }
    DealSnapshot::from_file(path).map_err(|e| match e {
        CommonError::Snapshot(message) => DealScoutError::InvalidSnapshot(message),
        CommonError::Json(e) => DealScoutError::InvalidSnapshot(e.to_string()),
        other => DealScoutError::Common(other),
    })
}

/// JSON出力用のセクション
#[derive(Debug, Serialize)]
struct SectionOut<'a> {
    category: &'a str,
    total: usize,
    deals: Vec<DealOut<'a>>,
}

#[derive(Debug, Serialize)]
struct DealOut<'a> {
    key: Option<String>,
    title: &'a str,
    price: &'a str,
    link: &'a str,
}

#[derive(Debug, Serialize)]
struct ListOut<'a> {
    total: usize,
    shown_sections: usize,
    hidden_sections: usize,
    sections: Vec<SectionOut<'a>>,
}

/// 絞り込み・並べ替え・表示上限を適用したページ
pub fn build_page<'a>(
    sections: &'a Sections,
    filter: &DealFilter,
    view: ViewMode,
    sort: SortOrder,
) -> SectionPage<'a> {
    paginate(filter_sections(sections, filter), view, sort)
}

/// 一覧を文字列に整形
pub fn render_list(
    sections: &Sections,
    page: &SectionPage<'_>,
    filter: &DealFilter,
    format: OutputFormat,
) -> Result<String> {
    use deal_scout_common::Identify;

    match format {
        OutputFormat::Json => {
            let out = ListOut {
                total: total_deals(sections),
                shown_sections: page.sections.len(),
                hidden_sections: page.hidden_sections,
                sections: page
                    .sections
                    .iter()
                    .map(|s| SectionOut {
                        category: s.category,
                        total: s.total,
                        deals: s
                            .deals
                            .iter()
                            .map(|d| DealOut {
                                key: d.item_key().map(|k| k.to_string()),
                                title: &d.title,
                                price: &d.price,
                                link: &d.link,
                            })
                            .collect(),
                    })
                    .collect(),
            };
            Ok(serde_json::to_string_pretty(&out)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            if page.sections.is_empty() {
                if filter.is_active() {
                    out.push_str("条件に一致するディールがありません\n");
                } else {
                    out.push_str("ディールがありません\n");
                }
                return Ok(out);
            }

            for section in &page.sections {
                out.push_str(&format!("■ {} ({}件)\n", section.category, section.total));
                for deal in &section.deals {
                    let price = if deal.price.is_empty() { "-" } else { deal.price.as_str() };
                    out.push_str(&format!("  - {} [{}]\n", deal.title, price));
                }
                if section.hidden_deals() > 0 {
                    out.push_str(&format!("  …他{}件\n", section.hidden_deals()));
                }
            }
            if page.hidden_sections > 0 {
                out.push_str(&format!("（他{}カテゴリは非表示）\n", page.hidden_sections));
            }
            Ok(out)
        }
    }
}

/// カテゴリ一覧を文字列に整形
pub fn render_categories(sections: &Sections, format: OutputFormat) -> Result<String> {
    let categories = available_categories(sections);
    match format {
        OutputFormat::Json => {
            let counts: Vec<(&str, usize)> = sections
                .iter()
                .map(|(name, deals)| (name.as_str(), deals.len()))
                .collect();
            Ok(serde_json::to_string_pretty(&counts)?)
        }
        OutputFormat::Text => {
            let (shown, more) = chip_categories(&categories);
            let mut out = format!("カテゴリ: {}件 / ディール: {}件\n", categories.len(), total_deals(sections));
            for name in shown {
                let count = sections.get(name).map(Vec::len).unwrap_or(0);
                out.push_str(&format!("  {} ({})\n", name, count));
            }
            if more > 0 {
                out.push_str(&format!("  +{}\n", more));
            }
            Ok(out)
        }
    }
}
