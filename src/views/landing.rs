use crate::AppServices;
use crate::dataset::CacheOutcome;
use crate::types::DatasetFile;
use crate::ui::AppTab;
use crate::views::shared::display_file_name;
use dioxus::prelude::*;

#[component]
pub fn LandingView(mut active_tab: Signal<AppTab>) -> Element {
    let services = use_context::<AppServices>();
    let mut selected = use_signal(|| Option::<DatasetFile>::None);
    let mut notice = use_signal(|| Option::<String>::None);
    let mut uploading = use_signal(|| false);

    {
        let landing = services.landing.clone();
        use_hook(move || {
            landing.enter();
        });
    }

    let on_file = move |evt: FormEvent| async move {
        let Some(engine) = evt.files() else {
            return;
        };
        let Some(path) = engine.files().into_iter().next() else {
            return;
        };
        match engine.read_file(&path).await {
            Some(bytes) => {
                selected.set(Some(DatasetFile::new(display_file_name(&path), bytes)));
                notice.set(None);
            }
            None => notice.set(Some(format!("Could not read {}", display_file_name(&path)))),
        }
    };

    let landing = services.landing.clone();
    let on_start = move |_| {
        let Some(file) = selected() else {
            return;
        };
        if uploading() {
            return;
        }
        uploading.set(true);
        let landing = landing.clone();
        spawn(async move {
            match landing.get_started(&file).await {
                Ok(outcome) => {
                    if let CacheOutcome::TooLarge { .. } = outcome {
                        tracing::warn!("dataset will not be restored after a reload");
                    }
                    active_tab.set(AppTab::Chat);
                }
                Err(err) => notice.set(Some(err.user_message())),
            }
            uploading.set(false);
        });
    };

    let selected_name = selected().map(|file| file.filename);

    rsx! {
        div { class: "main-container",
            section { class: "hero",
                h1 { "Chat with your data" }
                p { class: "text-muted", "Upload a CSV and ask questions in plain language." }
            }
            div { class: "upload-card",
                input {
                    r#type: "file",
                    accept: ".csv,.xls,.xlsx",
                    onchange: on_file,
                }
                if let Some(name) = selected_name {
                    p { class: "text-muted", "Selected: {name}" }
                }
                if let Some(text) = notice() {
                    p { class: "error", "{text}" }
                }
                button {
                    class: "btn btn-primary",
                    r#type: "button",
                    disabled: uploading() || selected().is_none(),
                    onclick: on_start,
                    if uploading() { "Uploading…" } else { "Get started" }
                }
            }
        }
    }
}
