//! Chat transcript state for the assistant panel.
//!
//! Transcripts are session-scoped and in-memory only; the persisted library
//! remains files and reading progress. A capacity cap evicts the oldest
//! turns so a long session cannot grow without bound.

use crate::model::now_ms;

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The reader's question.
    User,
    /// The assistant's reply (including error-indicator replies).
    Assistant,
    /// Status lines from the app itself.
    Notice,
}

/// A single transcript entry.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub timestamp_ms: u64,
}

/// Ordered chat turns with oldest-first eviction at capacity.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
    max_turns: usize,
}

impl Transcript {
    /// Create an empty transcript holding at most `max_turns` entries.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatRole::User, text.into());
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatRole::Assistant, text.into());
    }

    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.push(ChatRole::Notice, text.into());
    }

    fn push(&mut self, role: ChatRole, text: String) {
        self.turns.push(ChatTurn {
            role,
            text,
            timestamp_ms: now_ms(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.remove(0);
        }
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_add_and_retrieve() {
        let mut t = Transcript::new(10);
        t.push_user("what is this chart?");
        t.push_assistant("a population pyramid");

        assert_eq!(t.len(), 2);
        assert_eq!(t.turns()[0].role, ChatRole::User);
        assert_eq!(t.turns()[1].text, "a population pyramid");
    }

    #[test]
    fn transcript_evicts_oldest_at_capacity() {
        let mut t = Transcript::new(2);
        t.push_user("a");
        t.push_assistant("1");
        t.push_user("b");

        assert_eq!(t.len(), 2);
        assert_eq!(t.turns()[0].text, "1");
        assert_eq!(t.turns()[1].text, "b");
    }

    #[test]
    fn notices_are_ordinary_turns() {
        let mut t = Transcript::default();
        t.push_notice("assistant model not pulled");
        assert_eq!(t.turns()[0].role, ChatRole::Notice);
        assert!(t.turns()[0].timestamp_ms > 0);
    }

    #[test]
    fn empty_transcript() {
        let t = Transcript::default();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }
}
