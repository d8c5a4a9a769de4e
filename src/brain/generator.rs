// Generator seam - prompt history in, response text out

use super::{BrainError, Conversation};
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can answer a conversation with text
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next assistant response for the conversation
    async fn generate(&self, conversation: &Conversation) -> Result<String, BrainError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, conversation: &Conversation) -> Result<String, BrainError> {
        (**self).generate(conversation).await
    }
}
