use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flows::SlotFillState;

/// Names of session-scoped fields written by collection actions.
pub mod fields {
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PREFERENCE: &str = "preference";
    pub const COMPLAINT: &str = "complaint";
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    pub spoken_at: DateTime<Utc>,
}

/// Append-only, speaker-tagged conversation log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    entries: Vec<Utterance>,
}

impl ChatHistory {
    pub fn from_user_text(text: impl Into<String>) -> Self {
        let mut history = Self::default();
        history.push_user(text);
        history
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Speaker::User, text.into());
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Speaker::Assistant, text.into());
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.entries.push(Utterance { speaker, text, spoken_at: Utc::now() });
    }

    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// User utterances, newest first.
    pub fn user_texts_newest_first(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.speaker == Speaker::User)
            .map(|entry| entry.text.as_str())
    }

    pub fn latest_user_text(&self) -> Option<&str> {
        self.user_texts_newest_first().next()
    }

    pub fn latest_assistant_text(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.speaker == Speaker::Assistant)
            .map(|entry| entry.text.as_str())
    }

    /// `Speaker: text` lines in chronological order.
    pub fn transcript(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.speaker.label(), entry.text))
            .collect()
    }
}

/// A slot-filling rule suspended on a clarification prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSlotFill {
    pub intent: String,
    pub state: SlotFillState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub history: ChatHistory,
    pub filled_slots: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
    pub pending: Option<PendingSlotFill>,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            history: ChatHistory::default(),
            filled_slots: BTreeMap::new(),
            fields: BTreeMap::new(),
            pending: None,
            started_at: Utc::now(),
        }
    }

    pub fn fill_slot(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.filled_slots.insert(name.into(), value.into());
    }

    pub fn slot(&self, name: &str) -> Option<&str> {
        self.filled_slots.get(name).map(String::as_str)
    }

    /// Removes the named slots once the action that needed them has run.
    pub fn consume_slots<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, String> {
        names
            .into_iter()
            .filter_map(|name| self.filled_slots.remove_entry(name))
            .collect()
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Filled slot first, then session field.
    pub fn lookup_value(&self, name: &str) -> Option<&str> {
        self.slot(name).or_else(|| self.field(name))
    }
}

/// Live sessions keyed by id. Each session sits behind its own lock so two
/// transports feeding one session are serialized while other sessions proceed.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<SessionState>>>>,
}

impl SessionRegistry {
    pub fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<SessionState>> {
        let mut sessions = lock(&self.sessions);
        sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(id.clone()))))
            .clone()
    }

    pub fn snapshot(&self, id: &SessionId) -> Option<SessionState> {
        let session = lock(&self.sessions).get(id).cloned()?;
        let state = lock(&session).clone();
        Some(state)
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        lock(&self.sessions).remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
