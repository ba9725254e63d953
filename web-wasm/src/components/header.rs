//! ヘッダーコンポーネント

use leptos::prelude::*;

#[component]
pub fn Header(source: Signal<Option<&'static str>>, total: Signal<usize>) -> impl IntoView {
    view! {
        <header class="header">
            <h1>"Pepper Deals"</h1>
            <p class="subtitle">"Najlepsze oferty"</p>
            {move || source.get().map(|label| view! {
                <p class="source-label">{format!("{} · {} ofert", label, total.get())}</p>
            })}
        </header>
    }
}
