//! Conversation history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Bounded message history; the oldest messages fall off once `limit` is
/// reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: VecDeque<Message>,
    limit: usize,
}

impl Conversation {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn add_user(&mut self, content: &str) {
        self.push(Role::User, content);
    }

    pub fn add_assistant(&mut self, content: &str) {
        self.push(Role::Assistant, content);
    }

    fn push(&mut self, role: Role, content: &str) {
        self.messages.push_back(Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        while self.messages.len() > self.limit {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut conversation = Conversation::new(3);
        conversation.add_user("xin chào");
        conversation.add_assistant("Chào bạn!");
        conversation.add_user("tìm sách Gilead");
        conversation.add_assistant("Tìm thấy 1 sách");

        assert_eq!(conversation.len(), 3);
        let first = conversation.messages().next().unwrap();
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.content, "Chào bạn!");
    }
}
