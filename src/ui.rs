use crate::views::{ChatView, LandingView, VisualizeView};
use dioxus::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppTab {
    Landing,
    Chat,
    Visualize,
}

/// Root component. Expects an [`crate::AppServices`] in context.
#[component]
pub fn App() -> Element {
    let active_tab = use_signal(|| AppTab::Landing);

    rsx! {
        AppHeader { active_tab }
        match active_tab() {
            AppTab::Landing => rsx! { LandingView { active_tab } },
            AppTab::Chat => rsx! { ChatView { active_tab } },
            AppTab::Visualize => rsx! { VisualizeView { active_tab } },
        }
    }
}

#[component]
fn AppHeader(active_tab: Signal<AppTab>) -> Element {
    rsx! {
        div { class: "header no-divider",
            div { class: "header-content",
                span { class: "wordmark", "Vectora.ai" }
                TabNavigation { active_tab }
            }
        }
    }
}

#[component]
fn TabNavigation(mut active_tab: Signal<AppTab>) -> Element {
    let tabs = [("Home", AppTab::Landing), ("Chat", AppTab::Chat), ("Visualize", AppTab::Visualize)];
    rsx! {
        nav { class: "tabs",
            for (label, tab) in tabs {
                button {
                    class: format_args!("tab {}", if active_tab() == tab { "active" } else { "" }),
                    r#type: "button",
                    onclick: move |_| active_tab.set(tab),
                    "{label}"
                }
            }
        }
    }
}
