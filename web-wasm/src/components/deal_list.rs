//! ディールのセクション一覧とカード
//!
//! 各カードはマウント時にルート要素を分類器のハンドルへ結び付け、
//! アンマウント時に外す。カテゴリはカードのCSSクラスに反映する。

use crate::host::ClassifierHost;
use deal_scout_common::{Category, Deal, Identify, ItemKey, SectionPage, ViewMode};
use leptos::html::Div;
use leptos::prelude::*;
use std::collections::HashMap;

/// 1セクション分の表示データ（所有版）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionView {
    pub category: String,
    pub total: usize,
    pub deals: Vec<Deal>,
}

impl SectionView {
    fn hidden_deals(&self) -> usize {
        self.total.saturating_sub(self.deals.len())
    }

    /// 内容が変わったら作り直すためのキー
    fn render_key(&self) -> (String, Vec<String>) {
        (
            self.category.clone(),
            self.deals.iter().map(card_key).collect(),
        )
    }
}

/// 表示ページ（所有版）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageView {
    pub sections: Vec<SectionView>,
    pub hidden_sections: usize,
}

impl PageView {
    pub fn from_page(page: &SectionPage<'_>) -> Self {
        Self {
            sections: page
                .sections
                .iter()
                .map(|s| SectionView {
                    category: s.category.to_string(),
                    total: s.total,
                    deals: s.deals.iter().map(|d| (*d).clone()).collect(),
                })
                .collect(),
            hidden_sections: page.hidden_sections,
        }
    }

    /// 描画されるディール（表示順）
    pub fn deals(&self) -> Vec<Deal> {
        self.sections
            .iter()
            .flat_map(|s| s.deals.iter().cloned())
            .collect()
    }
}

fn card_key(deal: &Deal) -> String {
    deal.item_key()
        .map(|k| k.to_string())
        .unwrap_or_else(|| deal.link.clone())
}

fn shipping_label(shipping: &str) -> String {
    let lower = shipping.trim().to_lowercase();
    if lower.is_empty() {
        "Sprawdź dostawę".to_string()
    } else if lower.contains("darmow") || lower.contains("free") || lower == "0" {
        "Darmowa dostawa".to_string()
    } else {
        shipping.trim().to_string()
    }
}

#[component]
pub fn DealSections(
    page: Memo<PageView>,
    host: StoredValue<ClassifierHost, LocalStorage>,
    categories: RwSignal<HashMap<ItemKey, Category>>,
    tracked: RwSignal<u64>,
    view_mode: RwSignal<ViewMode>,
) -> impl IntoView {
    view! {
        <div class="deal-sections">
            <For
                each=move || page.get().sections
                key=|section| section.render_key()
                children=move |section| {
                    let hidden = section.hidden_deals();
                    let title = format!("{} ({})", section.category, section.total);
                    view! {
                        <section class="category-section">
                            <h2 class="section-title">{title}</h2>
                            <div class=move || match view_mode.get() {
                                ViewMode::List => "deal-list",
                                ViewMode::Grid => "deal-grid",
                            }>
                                <For
                                    each=move || section.deals.clone()
                                    key=card_key
                                    children=move |deal| view! {
                                        <DealCard
                                            deal=deal
                                            host=host
                                            categories=categories
                                            tracked=tracked
                                            view_mode=view_mode
                                        />
                                    }
                                />
                            </div>
                            {(hidden > 0).then(|| view! {
                                <p class="text-muted">{format!("…i jeszcze {} ofert", hidden)}</p>
                            })}
                        </section>
                    }
                }
            />
            <Show when=move || page.with(|p| p.hidden_sections > 0)>
                <p class="text-muted">
                    {move || format!("Pozostałe kategorie: {}", page.with(|p| p.hidden_sections))}
                </p>
            </Show>
        </div>
    }
}

#[component]
fn DealCard(
    deal: Deal,
    host: StoredValue<ClassifierHost, LocalStorage>,
    categories: RwSignal<HashMap<ItemKey, Category>>,
    tracked: RwSignal<u64>,
    view_mode: RwSignal<ViewMode>,
) -> impl IntoView {
    let key = deal.item_key();
    let node_ref = NodeRef::<Div>::new();

    // マウント後、および突き合わせでハンドルが作られた後に結び付ける
    {
        let key = key.clone();
        Effect::new(move |_| {
            tracked.track();
            let (Some(key), Some(div)) = (key.as_ref(), node_ref.get()) else {
                return;
            };
            let element: web_sys::Element = div.into();
            host.with_value(|h| h.attach(key, element));
        });
    }
    {
        let key = key.clone();
        on_cleanup(move || {
            if let Some(key) = &key {
                host.try_with_value(|h| h.detach(key));
            }
        });
    }

    let category = {
        let key = key.clone();
        move || {
            key.as_ref()
                .and_then(|k| categories.with(|m| m.get(k).copied()))
                .unwrap_or_default()
        }
    };

    let report = move |action: fn(&ClassifierHost, &ItemKey), key: &Option<ItemKey>| {
        if let Some(key) = key {
            host.with_value(|h| action(h, key));
        }
    };
    let on_open = {
        let key = key.clone();
        move |_| report(ClassifierHost::click, &key)
    };
    let on_reply = {
        let key = key.clone();
        move |_| report(ClassifierHost::reply, &key)
    };
    let on_delete = {
        let key = key.clone();
        move |_| report(ClassifierHost::delete, &key)
    };

    let class = {
        let category = category.clone();
        move || {
            let layout = match view_mode.get() {
                ViewMode::List => "full-width",
                ViewMode::Grid => "tile",
            };
            format!("deal-card {} category-{}", layout, category().as_str())
        }
    };

    let price = if deal.price.is_empty() { "—".to_string() } else { deal.price.clone() };
    let shipping = shipping_label(&deal.shipping_price);
    let image = (!deal.image.is_empty()).then(|| deal.image.clone());

    view! {
        <div class=class node_ref=node_ref>
            <div class="deal-image">
                {match image {
                    Some(src) => view! { <img src=src alt=deal.title.clone() loading="lazy" /> }.into_any(),
                    None => view! { <span class="no-image">"Brak zdjęcia"</span> }.into_any(),
                }}
                <span class="deal-price">{price}</span>
            </div>
            <div class="deal-body">
                <h3 class="deal-title">
                    <a href=deal.link.clone() target="_blank" rel="noopener noreferrer" on:click=on_open.clone()>
                        {deal.title.clone()}
                    </a>
                </h3>
                <p class="deal-shipping">{shipping}</p>
                {(!deal.description.is_empty()).then(|| view! {
                    <p class="deal-description">{deal.description.clone()}</p>
                })}
                <div class="deal-actions">
                    <span class="deal-category">{move || category().label()}</span>
                    <a href=deal.link.clone() target="_blank" rel="noopener noreferrer" on:click=on_open>
                        "Zobacz ofertę"
                    </a>
                    <button class="btn btn-small" on:click=on_reply>"Odpowiedz"</button>
                    <button class="btn btn-small btn-danger" on:click=on_delete>"Usuń"</button>
                </div>
            </div>
        </div>
    }
}
