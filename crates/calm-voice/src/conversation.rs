//! Conversation history and outbound reply context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the context sent to the reply generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completed user-utterance / assistant-reply pair. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    user_text: String,
    assistant_text: String,
    completed_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn assistant_text(&self) -> &str {
        &self.assistant_text
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// Ordered, append-only turn history for one session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn record(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Every prior turn as a user message followed by the assistant reply, then the new
    /// transcript as the final user message.
    pub fn context_for(&self, transcript: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2 + 1);
        for turn in &self.turns {
            messages.push(ChatMessage::user(turn.user_text.clone()));
            messages.push(ChatMessage::assistant(turn.assistant_text.clone()));
        }
        messages.push(ChatMessage::user(transcript));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_context_is_just_the_transcript() {
        let conversation = Conversation::new();
        assert_eq!(
            conversation.context_for("I yelled at my son"),
            vec![ChatMessage::user("I yelled at my son")]
        );
    }

    #[test]
    fn context_interleaves_prior_turns_in_order() {
        let mut conversation = Conversation::new();
        conversation.record(Turn::new("first", "reply one"));
        conversation.record(Turn::new("second", "reply two"));

        let context = conversation.context_for("third");
        assert_eq!(
            context,
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("reply one"),
                ChatMessage::user("second"),
                ChatMessage::assistant("reply two"),
                ChatMessage::user("third"),
            ]
        );
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
