//! 検索・カテゴリ絞り込み・表示切替

use deal_scout_common::catalog::chip_categories;
use deal_scout_common::{DealFilter, SortOrder, ViewMode};
use leptos::prelude::*;

const SORT_OPTIONS: [(SortOrder, &str); 5] = [
    (SortOrder::Original, "Domyślnie"),
    (SortOrder::Newest, "Najnowsze"),
    (SortOrder::PriceAsc, "Cena rosnąco"),
    (SortOrder::PriceDesc, "Cena malejąco"),
    (SortOrder::Title, "Alfabetycznie"),
];

#[component]
pub fn FilterPanel(
    categories: Signal<Vec<String>>,
    filter: RwSignal<DealFilter>,
    view_mode: RwSignal<ViewMode>,
    sort: RwSignal<SortOrder>,
) -> impl IntoView {
    let (show_filters, set_show_filters) = signal(true);

    let chips = move || {
        categories.with(|all| {
            let (shown, more) = chip_categories(all);
            (shown.to_vec(), more)
        })
    };

    view! {
        <div class="filter-panel">
            <div class="search-row">
                <input
                    type="search"
                    class="search-input"
                    placeholder="Szukaj ofert..."
                    aria-label="Szukaj ofert"
                    prop:value=move || filter.with(|f| f.query.clone())
                    on:input=move |ev| {
                        let query = event_target_value(&ev);
                        filter.update(|f| f.query = query);
                    }
                />
                <button
                    class="btn btn-secondary btn-small"
                    on:click=move |_| set_show_filters.update(|v| *v = !*v)
                >
                    {move || if show_filters.get() { "Ukryj filtry" } else { "Pokaż filtry" }}
                </button>
                <button
                    class="btn btn-tertiary btn-small"
                    title=move || match view_mode.get() {
                        ViewMode::List => "Przełącz na widok siatki",
                        ViewMode::Grid => "Przełącz na widok listy",
                    }
                    on:click=move |_| view_mode.update(|m| *m = m.toggled())
                >
                    {move || match view_mode.get() {
                        ViewMode::List => "▦",
                        ViewMode::Grid => "☰",
                    }}
                </button>
                <select
                    class="sort-select"
                    on:change=move |ev| {
                        if let Ok(order) = event_target_value(&ev).parse::<SortOrder>() {
                            sort.set(order);
                        }
                    }
                >
                    {SORT_OPTIONS
                        .iter()
                        .map(|(order, label)| {
                            let order = *order;
                            view! {
                                <option value=order.to_string() selected=move || sort.get() == order>
                                    {*label}
                                </option>
                            }
                        })
                        .collect_view()}
                </select>
            </div>

            <Show when=move || show_filters.get()>
                <div class="category-chips">
                    {move || {
                        let (shown, more) = chips();
                        view! {
                            {shown
                                .into_iter()
                                .map(|name| {
                                    let label = name.clone();
                                    let is_selected = {
                                        let name = name.clone();
                                        move || filter.with(|f| f.is_selected(&name))
                                    };
                                    view! {
                                        <button
                                            class=move || if is_selected() { "chip chip-selected" } else { "chip" }
                                            on:click=move |_| filter.update(|f| f.toggle(&name))
                                        >
                                            {label}
                                        </button>
                                    }
                                })
                                .collect_view()}
                            {(more > 0).then(|| view! { <span class="chip-more">{format!("+{} więcej", more)}</span> })}
                        }
                    }}
                    <Show when=move || filter.with(|f| !f.selected.is_empty())>
                        <button class="btn btn-link" on:click=move |_| filter.update(DealFilter::clear)>
                            "Wyczyść filtry"
                        </button>
                    </Show>
                </div>
            </Show>
        </div>
    }
}
