use crate::AppServices;
use crate::chat::{ChatOrchestrator, ChatState};
use crate::session::GateStatus;
use crate::types::{Message, Role};
use crate::ui::AppTab;
use crate::views::shared::{format_message_timestamp, markdown_to_html};
use dioxus::events::Key;
use dioxus::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(80);

#[component]
pub fn ChatView(active_tab: Signal<AppTab>) -> Element {
    let services = use_context::<AppServices>();
    let mut messages = use_signal({
        let chat = services.chat.clone();
        move || chat.hydrate()
    });
    let mut input = use_signal(String::new);
    let mut visualize = use_signal(|| false);
    let mut sending = use_signal(|| services.chat.state() == ChatState::Awaiting);
    let gate = use_signal({
        let gate = services.gate.clone();
        move || gate.check()
    });

    {
        let restorer = services.restorer.clone();
        use_hook(move || {
            restorer.restore();
        });
    }

    // Remounted mid-turn: the task that started the turn went away with the
    // previous mount, so follow it from here until it settles.
    {
        let chat = services.chat.clone();
        use_hook(move || {
            if chat.state() == ChatState::Awaiting {
                spawn(follow_turn(chat, messages, sending));
            }
        });
    }

    let send_message = use_callback({
        let chat = services.chat.clone();
        move |text: String| {
            if text.trim().is_empty() || sending() {
                return;
            }
            sending.set(true);
            input.set(String::new());

            let chat = chat.clone();
            let wants_chart = visualize();
            spawn(async move {
                let task = {
                    let chat = chat.clone();
                    tokio::spawn(async move { chat.submit(&text, wants_chart).await })
                };
                // Poll so the optimistic user message shows while awaiting.
                while !task.is_finished() {
                    messages.set(chat.messages());
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                match task.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => tracing::warn!(error = %err, "submission rejected"),
                    Err(err) => tracing::error!(error = %err, "chat task failed"),
                }
                messages.set(chat.messages());
                sending.set(false);
            });
        }
    });

    let on_cancel = {
        let chat = services.chat.clone();
        move |_| {
            chat.cancel();
        }
    };

    let messages_snapshot = messages();

    rsx! {
        div { class: "main-container",
            div { class: "chat-wrap",
                div { id: "chat-list", class: "chat-list",
                    for msg in messages_snapshot.iter() {
                        MessageRow { key: "{msg.id}", message: msg.clone(), active_tab }
                    }
                    if sending() {
                        div { class: "message-row assistant",
                            div { class: "avatar assistant", "V" }
                            div { class: "shimmer-line",
                                span { class: "shimmer-text", "Thinking…" }
                            }
                        }
                    }
                }
            }

            form { class: "composer no-divider",
                div { class: "composer-inner",
                    div { class: "hstack", style: "gap: 0.5rem; width: 100%; align-items: flex-end;",
                        textarea {
                            rows: "1", placeholder: "Ask a question about your data...",
                            value: "{input}", oninput: move |ev| input.set(ev.value()),
                            onkeydown: move |ev| {
                                if ev.key() == Key::Enter && !ev.modifiers().shift() {
                                    ev.prevent_default();
                                    let text = input();
                                    send_message.call(text);
                                }
                            },
                            disabled: sending(), autofocus: true,
                        }
                        if sending() {
                            button { class: "btn", r#type: "button", onclick: on_cancel, "Cancel" }
                        } else {
                            button {
                                class: "btn btn-primary", r#type: "button",
                                disabled: input().trim().is_empty(),
                                onclick: move |_| {
                                    let text = input();
                                    send_message.call(text);
                                },
                                "Send"
                            }
                        }
                    }
                    label { class: "visualize-toggle",
                        input {
                            r#type: "checkbox",
                            checked: visualize(),
                            onchange: move |_| visualize.set(!visualize()),
                        }
                        "Visualize"
                    }
                }
            }

            if gate().requires_sign_in() {
                SignInPrompt { gate }
            }
        }
    }
}

async fn follow_turn(
    chat: Arc<ChatOrchestrator>,
    mut messages: Signal<Vec<Message>>,
    mut sending: Signal<bool>,
) {
    chat.settled().await;
    messages.set(chat.messages());
    sending.set(false);
}

#[component]
fn MessageRow(message: Message, mut active_tab: Signal<AppTab>) -> Element {
    let role_class = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let has_charts = message.charts.as_ref().is_some_and(|charts| !charts.is_empty());
    let content_html = markdown_to_html(&message.content);
    let timestamp = format_message_timestamp(message.timestamp);

    rsx! {
        div { class: "message-row {role_class}",
            if matches!(message.role, Role::Assistant) { div { class: "avatar assistant", "V" } }
            div { class: "message-stack",
                div { class: "bubble {role_class}",
                    if matches!(message.role, Role::Assistant) {
                        div { class: "md", dangerous_inner_html: "{content_html}" }
                    } else {
                        "{message.content}"
                    }
                }
                if has_charts {
                    button {
                        class: "action-btn", r#type: "button",
                        onclick: move |_| active_tab.set(AppTab::Visualize),
                        "View chart"
                    }
                }
                if let Some(ts) = timestamp {
                    div { class: "message-meta",
                        span { class: "message-timestamp", "{ts}" }
                    }
                }
            }
        }
    }
}

/// Blocking overlay shown when no identity marker is present. History stays
/// visible underneath.
#[component]
fn SignInPrompt(mut gate: Signal<GateStatus>) -> Element {
    let services = use_context::<AppServices>();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let mut busy = use_signal(|| false);

    let on_sign_in = move |_| {
        let Some(auth) = services.auth.clone() else {
            error.set(Some("Sign-in is not available in this build.".to_string()));
            return;
        };
        let status_source = services.gate.clone();
        busy.set(true);
        spawn(async move {
            match auth.login(&email(), &password()).await {
                Ok(_) => {
                    error.set(None);
                    gate.set(status_source.check());
                }
                Err(err) => error.set(Some(err.user_message())),
            }
            busy.set(false);
        });
    };

    rsx! {
        div { class: "overlay",
            div { class: "dialog",
                h2 { "Sign in to continue" }
                p { class: "text-muted", "To keep chatting with your data assistant, please sign in to your account." }
                if let Some(text) = error() {
                    p { class: "error", "{text}" }
                }
                input { r#type: "email", placeholder: "Email", value: "{email}", oninput: move |ev| email.set(ev.value()) }
                input { r#type: "password", placeholder: "Password", value: "{password}", oninput: move |ev| password.set(ev.value()) }
                button {
                    class: "btn btn-primary", r#type: "button",
                    disabled: busy(),
                    onclick: on_sign_in,
                    "Sign In"
                }
            }
        }
    }
}
