use crate::AppServices;
use crate::types::ChartPayload;
use crate::ui::AppTab;
use dioxus::prelude::*;

#[component]
pub fn VisualizeView(mut active_tab: Signal<AppTab>) -> Element {
    let services = use_context::<AppServices>();
    let charts = use_hook({
        let handoff = services.charts.clone();
        move || handoff.consume()
    });

    rsx! {
        div { class: "main-container",
            div { class: "hstack",
                button {
                    class: "btn", r#type: "button",
                    onclick: move |_| active_tab.set(AppTab::Chat),
                    "Back"
                }
                h1 { "Data Visualization" }
            }
            match charts {
                None => rsx! {
                    p { class: "text-muted",
                        "No active visualization data found. Please ask for a chart in the chat first."
                    }
                },
                Some(charts) => rsx! {
                    for (i, chart) in charts.into_iter().enumerate() {
                        ChartCard { key: "{i}", chart }
                    }
                },
            }
        }
    }
}

/// Shows the chart description as handed over; drawing is left to the
/// renderer that owns the payload schema.
#[component]
fn ChartCard(chart: ChartPayload) -> Element {
    let title = chart.chart_type().unwrap_or("chart").to_string();
    let description = chart.description().map(str::to_string);
    let body = serde_json::to_string_pretty(&chart.0).unwrap_or_default();

    rsx! {
        div { class: "chart-card",
            h3 { class: "section-title", "{title}" }
            if let Some(text) = description {
                p { class: "text-muted", "{text}" }
            }
            pre { class: "chart-data", "{body}" }
        }
    }
}
