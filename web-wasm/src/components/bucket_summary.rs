//! 分類ごとの件数

use deal_scout_common::{Category, ItemKey};
use leptos::prelude::*;
use std::collections::HashMap;

#[component]
pub fn BucketSummary(categories: RwSignal<HashMap<ItemKey, Category>>) -> impl IntoView {
    let counts = move || {
        categories.with(|map| {
            Category::ALL
                .iter()
                .map(|c| (*c, map.values().filter(|v| *v == c).count()))
                .filter(|(_, n)| *n > 0)
                .collect::<Vec<_>>()
        })
    };

    view! {
        <div class="bucket-summary">
            {move || {
                counts()
                    .into_iter()
                    .map(|(category, count)| view! {
                        <span class=format!("bucket bucket-{}", category.as_str())>
                            {format!("{}: {}", category.label(), count)}
                        </span>
                    })
                    .collect_view()
            }}
        </div>
    }
}
