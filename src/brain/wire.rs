// Messages API wire format, built straight from a Conversation

use super::conversation::{Conversation, Role};
use super::{BrainConfig, BrainError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: Role,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> Request<'a> {
    /// Consecutive turns of one role become blocks of a single message
    pub(crate) fn new(
        conversation: &'a Conversation,
        config: &'a BrainConfig,
    ) -> Result<Self, BrainError> {
        let mut messages: Vec<Message<'a>> = Vec::new();
        for turn in conversation.turns() {
            let block = TextBlock {
                kind: "text",
                text: &turn.text,
            };
            match messages.last_mut() {
                Some(last) if last.role == turn.role => last.content.push(block),
                _ => messages.push(Message {
                    role: turn.role,
                    content: vec![block],
                }),
            }
        }

        if messages.first().map(|m| m.role) != Some(Role::User) {
            return Err(BrainError::InvalidRequest(
                "conversation must start with a user turn".to_string(),
            ));
        }

        Ok(Self {
            model: &config.default_model,
            system: conversation.system(),
            messages,
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl Response {
    /// Concatenated text blocks; thinking and other blocks are skipped
    pub(crate) fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Other => None,
            })
            .collect()
    }

    pub(crate) fn truncated(&self) -> bool {
        self.stop_reason.as_deref() == Some("max_tokens")
    }
}
