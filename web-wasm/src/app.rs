//! メインアプリケーションコンポーネント

use crate::components::{
    bucket_summary::BucketSummary,
    deal_list::{DealSections, PageView},
    filter_panel::FilterPanel,
    header::Header,
    upload_area::UploadArea,
};
use crate::host::{ClassifierHost, PublishListener};
use deal_scout_common::catalog::{available_categories, total_deals};
use deal_scout_common::{
    filter_sections, paginate, Category, DealFilter, DealSnapshot, ItemKey, SortOrder, ViewMode,
    FRAME_DELAY,
};
use leptos::prelude::*;
use std::collections::HashMap;
use std::rc::Rc;

/// メインアプリケーションコンポーネント
#[component]
pub fn App() -> impl IntoView {
    // 公開済みカテゴリ（分類器のフラッシュごとに置き換える）
    let categories = RwSignal::new(HashMap::<ItemKey, Category>::new());
    let on_publish: PublishListener = Rc::new(move |published: HashMap<ItemKey, Category>, _revision: u64| {
        categories.set(published)
    });

    match ClassifierHost::new(FRAME_DELAY, on_publish) {
        Ok(host) => {
            let host = StoredValue::new_local(host);
            view! { <Dashboard host=host categories=categories /> }.into_any()
        }
        Err(e) => {
            web_sys::console::error_2(&"failed to start viewport observer".into(), &e);
            view! {
                <div class="container">
                    <Header source=Signal::derive(|| None) total=Signal::derive(|| 0) />
                    <p class="error">"Przeglądarka nie obsługuje IntersectionObserver."</p>
                </div>
            }
            .into_any()
        }
    }
}

#[component]
fn Dashboard(
    host: StoredValue<ClassifierHost, LocalStorage>,
    categories: RwSignal<HashMap<ItemKey, Category>>,
) -> impl IntoView {
    let snapshot = RwSignal::new(None::<DealSnapshot>);
    let load_error = RwSignal::new(None::<String>);
    let filter = RwSignal::new(DealFilter::default());
    let view_mode = RwSignal::new(ViewMode::default());
    let sort = RwSignal::new(SortOrder::default());
    // 突き合わせのたびに増やし、カードに結び付けを促す
    let tracked = RwSignal::new(0u64);

    let sections = Memo::new(move |_| {
        snapshot.with(|s| s.as_ref().map(DealSnapshot::sections).unwrap_or_default())
    });
    let category_names = Signal::derive(move || sections.with(available_categories));
    let total = Signal::derive(move || sections.with(total_deals));
    let source = Signal::derive(move || snapshot.with(|s| s.as_ref().map(DealSnapshot::source_label)));

    let page = Memo::new(move |_| {
        let current = filter.get();
        let mode = view_mode.get();
        let order = sort.get();
        sections.with(|all| PageView::from_page(&paginate(filter_sections(all, &current), mode, order)))
    });

    // 描画リストが変わったら分類器と突き合わせる
    Effect::new(move |_| {
        let deals = page.with(PageView::deals);
        host.with_value(|h| h.reconcile(&deals));
        tracked.update(|v| *v += 1);
    });

    on_cleanup(move || {
        host.try_with_value(|h| h.teardown());
    });

    let on_loaded = move |json: String| match DealSnapshot::from_json(&json) {
        Ok(loaded) => {
            filter.update(DealFilter::clear);
            load_error.set(None);
            snapshot.set(Some(loaded));
        }
        Err(e) => load_error.set(Some(format!("Nieznany błąd podczas ładowania ofert: {}", e))),
    };

    let empty_message = move || {
        filter.with(|f| {
            if f.is_active() {
                let query = f.normalized_query();
                if query.is_empty() {
                    "Brak wyników".to_string()
                } else {
                    format!("Brak wyników dla \"{}\"", query)
                }
            } else {
                "Nie znaleziono ofert. Spróbuj ponownie później.".to_string()
            }
        })
    };

    view! {
        <div class="container">
            <Header source=source total=total />

            <UploadArea on_loaded=on_loaded />

            {move || load_error.get().map(|message| view! { <p class="error">{message}</p> })}

            <Show
                when=move || snapshot.with(Option::is_some)
                fallback=|| view! { <p class="text-muted">"Wczytaj plik z ofertami, aby rozpocząć"</p> }
            >
                <FilterPanel categories=category_names filter=filter view_mode=view_mode sort=sort />
                <BucketSummary categories=categories />

                <Show
                    when=move || page.with(|p| !p.sections.is_empty())
                    fallback=move || view! { <p class="text-muted">{empty_message}</p> }
                >
                    <DealSections
                        page=page
                        host=host
                        categories=categories
                        tracked=tracked
                        view_mode=view_mode
                    />
                </Show>
            </Show>
        </div>
    }
}
