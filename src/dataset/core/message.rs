//! Conversation record model shared by the store, the form layer and export.

use serde::{Deserialize, Serialize};

/// Training-importance multiplier attached to an assistant message.
pub type Weight = u64;

/// Weight used when none is given or the given one is unusable.
pub const DEFAULT_WEIGHT: Weight = 1;

const fn default_weight() -> Weight {
    DEFAULT_WEIGHT
}

/// Role of a message within a conversation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Leading instruction for the assistant.
    System,
    /// Human turn.
    User,
    /// Model turn carrying a weight.
    Assistant,
}

/// A single message, tagged by `role` on the wire.
///
/// Serializes as `{"role":"user","content":"..."}`; assistant messages also
/// carry `weight`, which defaults to 1 when a stored record omits it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// System instruction.
    System {
        /// Message text.
        content: String,
    },
    /// User turn.
    User {
        /// Message text.
        content: String,
    },
    /// Assistant turn.
    Assistant {
        /// Message text.
        content: String,
        /// Training weight for this turn.
        #[serde(default = "default_weight")]
        weight: Weight,
    },
}

impl Message {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Build an assistant message with a weight.
    #[must_use]
    pub fn assistant(content: impl Into<String>, weight: Weight) -> Self {
        Self::Assistant {
            content: content.into(),
            weight,
        }
    }

    /// Role of this message.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
        }
    }
}

/// One training example: an ordered message sequence.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Messages in order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Wrap a message sequence.
    #[must_use]
    pub const fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Content of the leading system message, if any.
    #[must_use]
    pub fn system_message(&self) -> Option<&str> {
        match self.messages.first() {
            Some(Message::System { content }) => Some(content),
            _ => None,
        }
    }

    /// Number of assistant turns.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .count()
    }

    /// Check the record shape: optional leading system message, then at least
    /// one user/assistant pair, strictly alternating.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let body = if self.system_message().is_some() {
            &self.messages[1..]
        } else {
            &self.messages[..]
        };

        if body.is_empty() || body.len() % 2 != 0 {
            return false;
        }

        body.chunks_exact(2).all(|pair| {
            pair[0].role() == Role::User && pair[1].role() == Role::Assistant
        })
    }
}
