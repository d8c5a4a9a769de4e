// Conversation history handed to a generator

use serde::{Deserialize, Serialize};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// One turn of a conversation, optionally tagged so it can serve as a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Ordered conversation with an optional system prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            turns: Vec::new(),
        }
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
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

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>, tag: Option<&str>) {
        self.push(Role::User, text.into(), tag);
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, tag: Option<&str>) {
        self.push(Role::Assistant, text.into(), tag);
    }

    fn push(&mut self, role: Role, text: String, tag: Option<&str>) {
        self.turns.push(Turn {
            role,
            text,
            tag: tag.map(str::to_string),
        });
    }

    /// Replace the text of the last turn, used when a response is regenerated or coerced
    pub fn replace_last(&mut self, text: impl Into<String>) -> bool {
        match self.turns.last_mut() {
            Some(turn) => {
                turn.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Remove the last turn
    pub fn pop(&mut self) -> Option<Turn> {
        self.turns.pop()
    }
}
