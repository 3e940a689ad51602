//! In-memory conversation state store.
//!
//! Tracks one state record per remote thread id: turn counter, timestamps
//! and the last exchanged messages. Nothing persists across restarts; the
//! remote thread/run objects are orphaned if the process dies.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

/// Per-thread conversation state. Returned by the store as a snapshot.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub thread_id: String,
    pub assistant_id: Option<String>,
    pub last_user_message: Option<String>,
    pub last_assistant_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub turn_count: u32,
    /// Open-ended auxiliary context attached to the conversation.
    pub context: HashMap<String, serde_json::Value>,
}

impl ConversationState {
    fn new(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            assistant_id: None,
            last_user_message: None,
            last_assistant_response: None,
            created_at: Utc::now(),
            last_updated_at: None,
            turn_count: 0,
            context: HashMap::new(),
        }
    }

    /// Most recent activity: last update, or creation if never updated.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_updated_at.unwrap_or(self.created_at)
    }
}

/// Process-wide store of conversation states, keyed by thread id.
///
/// All operations are safe under concurrent invocation; `update` applies its
/// whole read-modify-write under one lock acquisition.
#[derive(Default)]
pub struct ConversationStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // On lock poisoning (a panicking thread held the lock), keep serving
    // rather than crashing the gateway.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ConversationState>> {
        self.states.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ConversationState>> {
        self.states.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the state for a thread, creating a fresh one if absent.
    /// Existing states are returned mutation-free.
    pub fn get_or_create(&self, thread_id: &str) -> ConversationState {
        let mut states = self.write();
        states
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                tracing::info!(thread_id, "created new conversation state");
                ConversationState::new(thread_id)
            })
            .clone()
    }

    /// Record which assistant serves this thread.
    pub fn set_assistant_id(&self, thread_id: &str, assistant_id: &str) {
        let mut states = self.write();
        states
            .entry(thread_id.to_string())
            .or_insert_with(|| ConversationState::new(thread_id))
            .assistant_id = Some(assistant_id.to_string());
    }

    /// Record one completed exchange: last messages, update timestamp and
    /// turn counter move together as one logical unit.
    pub fn update(
        &self,
        thread_id: &str,
        user_message: &str,
        assistant_response: &str,
    ) -> ConversationState {
        let mut states = self.write();
        let state = states
            .entry(thread_id.to_string())
            .or_insert_with(|| ConversationState::new(thread_id));
        state.last_user_message = Some(user_message.to_string());
        state.last_assistant_response = Some(assistant_response.to_string());
        state.last_updated_at = Some(Utc::now());
        state.turn_count += 1;
        state.clone()
    }

    /// Attach an auxiliary context value to a thread.
    pub fn set_context(&self, thread_id: &str, key: &str, value: serde_json::Value) {
        let mut states = self.write();
        states
            .entry(thread_id.to_string())
            .or_insert_with(|| ConversationState::new(thread_id))
            .context
            .insert(key.to_string(), value);
    }

    pub fn get(&self, thread_id: &str) -> Option<ConversationState> {
        self.read().get(thread_id).cloned()
    }

    pub fn is_active(&self, thread_id: &str) -> bool {
        self.read().contains_key(thread_id)
    }

    /// Drop all conversation states.
    pub fn clear_all(&self) {
        self.write().clear();
        tracing::info!("cleared all conversation states");
    }

    /// The most recently active thread. Ties on the activity timestamp are
    /// broken deterministically: the lexically greatest thread id wins.
    pub fn current_thread_id(&self) -> Option<String> {
        self.read()
            .values()
            .max_by(|a, b| {
                a.last_activity()
                    .cmp(&b.last_activity())
                    .then_with(|| a.thread_id.cmp(&b.thread_id))
            })
            .map(|state| state.thread_id.clone())
    }
}
