use serde::{Deserialize, Serialize};

/// Recorded when translation never produced a statement.
pub const NO_SQL_SENTINEL: &str = "NO_SQL_GENERATED";

/// One turn of the running conversation. A user question and the system's
/// outcome are always appended together, in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationEntry {
    User {
        text: String,
    },
    System {
        friendly_text: String,
        /// Empty string when the turn completed without error.
        technical_details: String,
        sql: String,
        raw_results: Vec<serde_json::Value>,
        model_used: String,
        error: bool,
    },
}

/// Append-only, size-bounded conversation buffer.
///
/// Entries arrive in user/system pairs and leave in pairs, so a question is
/// never shown without its outcome. The bound keeps a long-lived process from
/// growing without limit; callers serialize access behind a single mutex.
#[derive(Debug)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
    capacity: usize,
}

impl ConversationLog {
    /// `capacity` is the maximum number of entries (not pairs); it is rounded
    /// down to an even count so eviction always removes whole turns.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(2) & !1,
        }
    }

    /// Append one completed turn: the user entry followed by the system entry.
    pub fn push_turn(&mut self, user: ConversationEntry, system: ConversationEntry) {
        self.entries.push(user);
        self.entries.push(system);
        while self.entries.len() > self.capacity {
            self.entries.drain(..2);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
