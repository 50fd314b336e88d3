//! Chat messages and the append-only message log

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender name shown for locally authored messages
pub const LOCAL_SENDER_NAME: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    Local,
    Remote(String),
}

impl Sender {
    pub fn name(&self) -> &str {
        match self {
            Sender::Local => LOCAL_SENDER_NAME,
            Sender::Remote(name) => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Sender::Local)
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single chat line, immutable once logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub content: String,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn local<C: Into<String>>(content: C, timestamp: Timestamp) -> Self {
        Self {
            sender: Sender::Local,
            content: content.into(),
            timestamp,
        }
    }

    pub fn remote<N: Into<String>, C: Into<String>>(name: N, content: C, timestamp: Timestamp) -> Self {
        Self {
            sender: Sender::Remote(name.into()),
            content: content.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp.time_of_day(), self.sender, self.content)
    }
}

/// Ordered message history. Entries are never removed or edited.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_names() {
        assert_eq!(Sender::Local.name(), "You");
        assert_eq!(Sender::Remote("Remote".into()).name(), "Remote");
    }

    #[test]
    fn test_log_preserves_order() {
        let mut log = MessageLog::new();
        log.append(Message::local("one", Timestamp::new(1)));
        log.append(Message::remote("Bob", "two", Timestamp::new(2)));

        let contents: Vec<&str> = log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert_eq!(log.len(), 2);
    }
}
