//! Per-context conversation histories.
//!
//! Every character and crime scene has its own ordered transcript, keyed by a
//! context id (the character name or scene id). Messages can be rewritten in
//! place, which is how streamed replies replace their placeholder text.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a message, unique within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A single line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    speaker: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Keyed collection of message histories.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    threads: HashMap<String, VecDeque<Message>>,
    /// Next id per context. Survives `clear` so ids handed out before a reset
    /// can never match a later message.
    next_ids: HashMap<String, u64>,
    limit: Option<usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `limit` messages per context,
    /// dropping the oldest first.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Append a message. Empty text is ignored and yields no id.
    pub fn append(&mut self, context: &str, speaker: impl Into<String>, text: &str) -> Option<MessageId> {
        if text.is_empty() {
            return None;
        }

        let next = self.next_ids.entry(context.to_string()).or_insert(0);
        let id = MessageId(*next);
        *next += 1;

        let thread = self.threads.entry(context.to_string()).or_default();
        thread.push_back(Message {
            id,
            speaker: speaker.into(),
            text: text.to_string(),
            created_at: Utc::now(),
        });

        if let Some(limit) = self.limit {
            while thread.len() > limit {
                thread.pop_front();
            }
        }

        Some(id)
    }

    /// Replace a message's text. Returns `false` if the context or message no
    /// longer exists.
    pub fn replace_text(&mut self, context: &str, id: MessageId, text: impl Into<String>) -> bool {
        let Some(thread) = self.threads.get_mut(context) else {
            return false;
        };
        let Some(index) = index_of(thread, id) else {
            return false;
        };
        thread[index].text = text.into();
        true
    }

    /// Remove a message if it is the newest in its context. Its id is never
    /// handed out again.
    pub fn remove_last(&mut self, context: &str, id: MessageId) -> bool {
        let Some(thread) = self.threads.get_mut(context) else {
            return false;
        };
        if thread.back().map(|m| m.id) != Some(id) {
            return false;
        }
        thread.pop_back();
        if thread.is_empty() {
            self.threads.remove(context);
        }
        true
    }

    /// Copy of a context's transcript, oldest first.
    pub fn history(&self, context: &str) -> Vec<Message> {
        self.threads
            .get(context)
            .map(|thread| thread.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up one message.
    pub fn message(&self, context: &str, id: MessageId) -> Option<&Message> {
        let thread = self.threads.get(context)?;
        index_of(thread, id).map(|i| &thread[i])
    }

    /// The most recent message in a context.
    pub fn last(&self, context: &str) -> Option<&Message> {
        self.threads.get(context).and_then(|thread| thread.back())
    }

    /// Number of messages in a context.
    pub fn len(&self, context: &str) -> usize {
        self.threads.get(context).map_or(0, VecDeque::len)
    }

    /// Whether a context has any history.
    pub fn has_history(&self, context: &str) -> bool {
        self.len(context) > 0
    }

    /// Drop a context's transcript.
    pub fn clear(&mut self, context: &str) {
        self.threads.remove(context);
    }

    /// The last `max_lines` messages rendered as `speaker: text`.
    pub fn formatted_history(&self, context: &str, max_lines: usize) -> Vec<String> {
        let Some(thread) = self.threads.get(context) else {
            return Vec::new();
        };
        let skip = thread.len().saturating_sub(max_lines);
        thread
            .iter()
            .skip(skip)
            .map(|m| format!("{}: {}", m.speaker, m.text))
            .collect()
    }
}

/// Ids within a thread increase and are usually consecutive, so a message's
/// position is normally its offset from the oldest surviving id. Gaps left by
/// `remove_last` fall back to a binary search.
fn index_of(thread: &VecDeque<Message>, id: MessageId) -> Option<usize> {
    let first = thread.front()?.id.0;
    let offset = usize::try_from(id.0.checked_sub(first)?).ok()?;
    if thread.get(offset).is_some_and(|m| m.id == id) {
        return Some(offset);
    }
    thread.binary_search_by_key(&id.0, |m| m.id.0).ok()
}

/// Word-wrap text to lines of at most `max_chars` characters where possible.
/// Words longer than the limit get a line of their own.
pub fn wrap_text(text: &str, max_chars: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}
