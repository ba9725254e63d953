//! スナップショット読み込みエリア
//!
//! キャッシュ済みエンドポイントのJSONを保存したファイルを読み込む。

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{DragEvent, File, FileReader, HtmlInputElement};

#[component]
pub fn UploadArea<F>(on_loaded: F) -> impl IntoView
where
    F: Fn(String) + 'static + Clone + Send + Sync,
{
    let (is_dragover, set_is_dragover) = signal(false);

    let on_drop = {
        let on_loaded = on_loaded.clone();
        move |ev: DragEvent| {
            ev.prevent_default();
            set_is_dragover.set(false);
            let file = ev
                .data_transfer()
                .and_then(|dt| dt.files())
                .and_then(|files| files.get(0));
            if let Some(file) = file {
                read_file(file, on_loaded.clone());
            }
        }
    };

    let on_dragover = move |ev: DragEvent| {
        ev.prevent_default();
        set_is_dragover.set(true);
    };

    let on_dragleave = move |_: DragEvent| {
        set_is_dragover.set(false);
    };

    let on_change = move |ev: web_sys::Event| {
        let input: HtmlInputElement = event_target(&ev);
        if let Some(file) = input.files().and_then(|files| files.get(0)) {
            read_file(file, on_loaded.clone());
        }
        input.set_value("");
    };

    view! {
        <label
            class=move || if is_dragover.get() { "upload-area dragover" } else { "upload-area" }
            on:drop=on_drop
            on:dragover=on_dragover
            on:dragleave=on_dragleave
        >
            <div class="upload-icon">"🏷"</div>
            <p>"Przeciągnij plik z ofertami (JSON) lub kliknij, aby wybrać"</p>
            <input type="file" accept="application/json,.json" class="hidden" on:change=on_change />
        </label>
    }
}

fn read_file<F>(file: File, on_loaded: F)
where
    F: Fn(String) + 'static,
{
    let Ok(reader) = FileReader::new() else {
        web_sys::console::error_1(&"FileReader is not available".into());
        return;
    };

    let reader_clone = reader.clone();
    let onload = Closure::once_into_js(move |_: web_sys::ProgressEvent| {
        if let Some(text) = reader_clone.result().ok().and_then(|r| r.as_string()) {
            on_loaded(text);
        }
    });

    reader.set_onload(Some(onload.unchecked_ref()));
    if let Err(e) = reader.read_as_text(&file) {
        web_sys::console::error_2(&"failed to read snapshot file".into(), &e);
    }
}
