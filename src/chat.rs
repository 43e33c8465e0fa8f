//! Chat turn orchestration.
//!
//! Two steady states, [`ChatState::Idle`] and [`ChatState::Awaiting`]. A
//! submission appends the user message, asks the backend, and always ends the
//! turn with exactly one assistant message: the answer, or the error's
//! user-facing text. Only one turn may be in flight. A turn that outlives a
//! [`ChatOrchestrator::clear`] leaves the fresh log untouched.

use crate::charts::ChartHandoff;
use crate::conversation::ConversationStore;
use crate::gateway::{AnalysisBackend, AskRequest, GatewayError};
use crate::session::SessionGate;
use crate::types::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Awaiting,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,

    #[error("a question is already awaiting an answer")]
    Busy,
}

/// One finished turn.
#[derive(Clone, Debug)]
pub struct Turn {
    pub question: Message,
    pub reply: Message,
    /// Set when `reply` carries an error text instead of an answer.
    pub error: Option<GatewayError>,
    /// False when the log was cleared mid-turn. The reply then has no id and
    /// is not part of the log.
    pub recorded: bool,
}

impl Turn {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ChatOrchestrator {
    conversation: Mutex<ConversationStore>,
    backend: Arc<dyn AnalysisBackend>,
    charts: ChartHandoff,
    gate: SessionGate,
    awaiting: AtomicBool,
    state_tx: watch::Sender<ChatState>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl ChatOrchestrator {
    pub fn new(
        conversation: ConversationStore,
        backend: Arc<dyn AnalysisBackend>,
        charts: ChartHandoff,
        gate: SessionGate,
    ) -> Self {
        Self {
            conversation: Mutex::new(conversation),
            backend,
            charts,
            gate,
            awaiting: AtomicBool::new(false),
            state_tx: watch::Sender::new(ChatState::Idle),
            in_flight: Mutex::new(None),
        }
    }

    /// Reload the log from storage (chat surface mount).
    pub fn hydrate(&self) -> Vec<Message> {
        self.with_conversation(|conversation| conversation.load())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.with_conversation(|conversation| conversation.messages().to_vec())
    }

    pub fn state(&self) -> ChatState {
        if self.awaiting.load(Ordering::SeqCst) {
            ChatState::Awaiting
        } else {
            ChatState::Idle
        }
    }

    /// Resolves once no turn is in flight. Lets an observer that did not
    /// start the turn (a remounted view) follow it to the end.
    pub async fn settled(&self) {
        let mut state = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(|state| *state == ChatState::Idle).await;
    }

    /// Cancel the in-flight question. The turn still completes, with a
    /// cancellation notice as its reply. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let token = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Start over with an empty log. An in-flight turn is cancelled and its
    /// reply is never written back. Returns whether a saved log was dropped.
    pub fn clear(&self) -> bool {
        self.cancel();
        self.with_conversation(|conversation| {
            let had_history = conversation.has_saved_history();
            conversation.clear();
            had_history
        })
    }

    pub async fn submit(&self, text: &str, visualize: bool) -> Result<Turn, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self
            .awaiting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("ignoring submission while awaiting an answer");
            return Err(SubmitError::Busy);
        }
        self.state_tx.send_replace(ChatState::Awaiting);
        let _awaiting = AwaitingGuard {
            awaiting: &self.awaiting,
            state: &self.state_tx,
        };

        let token = CancellationToken::new();
        self.set_in_flight(Some(token.clone()));

        let (user_message, generation) = self.with_conversation(|conversation| {
            (conversation.append_user(text), conversation.generation())
        });
        let user_id = self
            .gate
            .identity()
            .map(|identity| identity.user_id)
            .filter(|id| !id.is_empty());
        let request = AskRequest::new(text, visualize).with_user_id(user_id);

        let result = tokio::select! {
            _ = token.cancelled() => Err(GatewayError::Cancelled),
            result = self.backend.ask(&request) => result,
        };
        self.set_in_flight(None);

        let (content, charts, error) = match result {
            Ok(response) => (response.answer, response.charts, None),
            Err(err) => {
                tracing::warn!(error = %err, "error communicating with the analysis API");
                (err.user_message(), None, Some(err))
            }
        };

        // Checked under the same lock as the append so a concurrent clear wins.
        let (reply, recorded) = self.with_conversation(|conversation| {
            if conversation.generation() == generation {
                (conversation.append_assistant(content, charts.clone()), true)
            } else {
                (Message::assistant(String::new(), content, charts.clone()), false)
            }
        });

        if !recorded {
            tracing::info!("conversation cleared while awaiting, dropping reply");
        } else if let Some(charts) = &charts {
            if let Err(err) = self.charts.publish(charts) {
                tracing::warn!(error = %err, "failed to hand off charts");
            }
        }

        Ok(Turn {
            question: user_message,
            reply,
            error,
            recorded,
        })
    }

    fn with_conversation<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        let mut conversation = self
            .conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut conversation)
    }

    fn set_in_flight(&self, token: Option<CancellationToken>) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Returns the orchestrator to Idle even if the submit future is dropped.
struct AwaitingGuard<'a> {
    awaiting: &'a AtomicBool,
    state: &'a watch::Sender<ChatState>,
}

impl Drop for AwaitingGuard<'_> {
    fn drop(&mut self) {
        self.awaiting.store(false, Ordering::SeqCst);
        self.state.send_replace(ChatState::Idle);
    }
}
