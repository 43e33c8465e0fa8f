use crate::store::{PersistentStore, StoreError, StoreResult, keys};
use crate::types::{ChartPayload, Conversation, Message};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

pub const DEFAULT_CONVERSATION_ID: &str = "1";
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Owns the ordered message log of the active conversation.
///
/// The full log is rewritten to the store after every append (last write
/// wins). An empty log is never written, so a cold start cannot clobber a
/// longer history saved earlier.
pub struct ConversationStore {
    store: Arc<dyn PersistentStore>,
    id: String,
    title: String,
    created_at: OffsetDateTime,
    messages: Vec<Message>,
    last_id: u128,
    generation: u64,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            id: DEFAULT_CONVERSATION_ID.to_string(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            created_at: OffsetDateTime::now_utc(),
            messages: Vec::new(),
            last_id: 0,
            generation: 0,
        }
    }

    /// Hydrate the log from storage. Malformed data is discarded with a
    /// warning and the log starts empty.
    pub fn load(&mut self) -> Vec<Message> {
        self.messages = match self.store.get(keys::CHAT_MESSAGES) {
            Some(raw) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed chat history");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.last_id = self
            .messages
            .iter()
            .filter_map(|msg| msg.id.parse::<u128>().ok())
            .max()
            .unwrap_or(0);
        if let Some(first) = self.messages.first() {
            self.created_at = first.timestamp;
        }
        self.messages.clone()
    }

    /// Append to the log and persist it. Storage failures are logged, the
    /// in-memory log still grows.
    pub fn append(&mut self, message: Message) {
        if let Ok(id) = message.id.parse::<u128>() {
            self.last_id = self.last_id.max(id);
        }
        self.messages.push(message);
        if let Err(err) = self.persist() {
            tracing::warn!(error = %err, "failed to persist chat history");
        }
    }

    pub fn append_user(&mut self, content: impl Into<String>) -> Message {
        let message = Message::user(self.next_id(), content);
        self.append(message.clone());
        message
    }

    pub fn append_assistant(
        &mut self,
        content: impl Into<String>,
        charts: Option<Vec<ChartPayload>>,
    ) -> Message {
        let message = Message::assistant(self.next_id(), content, charts);
        self.append(message.clone());
        message
    }

    /// Drop the stored log, used when a new analysis session starts.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_id = 0;
        self.generation += 1;
        if let Err(err) = self.store.remove(keys::CHAT_MESSAGES) {
            tracing::warn!(error = %err, "failed to clear chat history");
        }
    }

    /// Bumped by every [`ConversationStore::clear`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether storage holds a log, regardless of whether it parses.
    pub fn has_saved_history(&self) -> bool {
        self.store.get(keys::CHAT_MESSAGES).is_some()
    }

    pub fn conversation(&self) -> Conversation {
        Conversation {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            messages: self.messages.clone(),
        }
    }

    fn persist(&self) -> StoreResult<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let encoded =
            serde_json::to_string(&self.messages).map_err(|source| StoreError::Encode {
                key: keys::CHAT_MESSAGES.to_string(),
                source,
            })?;
        tracing::debug!(count = self.messages.len(), "persisting chat history");
        self.store.set(keys::CHAT_MESSAGES, &encoded)
    }

    // Millisecond clock, bumped past the previous id so ids stay unique and ordered.
    fn next_id(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_millis())
            .unwrap_or_default();
        self.last_id = now.max(self.last_id + 1);
        self.last_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Role;
    use serde_json::json;

    fn fresh() -> (Arc<MemoryStore>, ConversationStore) {
        let store = Arc::new(MemoryStore::new());
        let conversation = ConversationStore::new(store.clone());
        (store, conversation)
    }

    #[test]
    fn load_from_empty_store_is_empty() {
        let (_, mut conversation) = fresh();
        assert!(conversation.load().is_empty());
    }

    #[test]
    fn append_survives_reload() {
        let (store, mut conversation) = fresh();
        conversation.append_user("hi");

        let mut reloaded = ConversationStore::new(store);
        let messages = reloaded.load();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn malformed_history_is_discarded() {
        let (store, mut conversation) = fresh();
        store.set(keys::CHAT_MESSAGES, "{not json").unwrap();
        assert!(conversation.load().is_empty());
        // the bad value stays until the next real write
        assert!(store.get(keys::CHAT_MESSAGES).is_some());
    }

    #[test]
    fn empty_log_never_overwrites_saved_history() {
        let (store, mut first) = fresh();
        first.append_user("one");
        first.append_assistant("two", None);

        let cold = ConversationStore::new(store.clone());
        assert!(cold.persist().is_ok());

        let mut reloaded = ConversationStore::new(store);
        assert_eq!(reloaded.load().len(), 2);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let (_, mut conversation) = fresh();
        let ids: Vec<u128> = (0..20)
            .map(|i| conversation.append_user(format!("m{i}")).id.parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn ids_continue_after_reload() {
        let (store, mut conversation) = fresh();
        let before = conversation.append_user("a");

        let mut reloaded = ConversationStore::new(store);
        reloaded.load();
        let after = reloaded.append_user("b");
        assert!(after.id.parse::<u128>().unwrap() > before.id.parse::<u128>().unwrap());
    }

    #[test]
    fn charts_and_timestamps_round_trip() {
        let (store, mut conversation) = fresh();
        let chart = ChartPayload(json!({"type": "bar", "data": [1, 2, 3], "metric": "sum"}));
        let sent = conversation.append_assistant("here", Some(vec![chart.clone()]));

        let mut reloaded = ConversationStore::new(store);
        let loaded = reloaded.load();
        assert_eq!(loaded[0].charts, Some(vec![chart]));
        assert_eq!(
            loaded[0].timestamp.unix_timestamp(),
            sent.timestamp.unix_timestamp()
        );
    }

    #[test]
    fn clear_removes_stored_log() {
        let (store, mut conversation) = fresh();
        conversation.append_user("stale");
        conversation.clear();

        assert!(conversation.messages().is_empty());
        assert_eq!(store.get(keys::CHAT_MESSAGES), None);
    }

    #[test]
    fn clear_bumps_generation() {
        let (_, mut conversation) = fresh();
        let before = conversation.generation();
        conversation.append_user("q");
        assert_eq!(conversation.generation(), before);

        conversation.clear();
        assert_eq!(conversation.generation(), before + 1);
        conversation.load();
        assert_eq!(conversation.generation(), before + 1);
    }

    #[test]
    fn conversation_snapshot_uses_default_identity() {
        let (_, mut conversation) = fresh();
        conversation.append_user("q");
        let snapshot = conversation.conversation();
        assert_eq!(snapshot.id, DEFAULT_CONVERSATION_ID);
        assert_eq!(snapshot.title, DEFAULT_CONVERSATION_TITLE);
        assert_eq!(snapshot.messages.len(), 1);
    }
}
