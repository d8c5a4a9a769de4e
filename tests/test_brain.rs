use sandloop::brain::{Brain, BrainConfig, Conversation, Generator};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing_subscriber::fmt;

/// Initialize tracing subscriber for tests
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

/// Global Brain instance shared across tests; `None` when no endpoint is configured
static BRAIN: OnceCell<Option<Arc<Brain>>> = OnceCell::const_new();

async fn get_brain() -> Option<&'static Arc<Brain>> {
    init_tracing();

    BRAIN
        .get_or_init(|| async {
            let config = BrainConfig::from_env().ok()?;
            let brain = Brain::new(config).expect("Failed to create Brain");
            Some(Arc::new(brain))
        })
        .await
        .as_ref()
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Integration test - requires INFERENCE_ENDPOINT, INFERENCE_API_KEY and INFERENCE_MODEL
    #[tokio::test]
    async fn test_generate_code_block() {
        let Some(brain) = get_brain().await else {
            eprintln!("inference endpoint not configured, skipping");
            return;
        };

        let mut conversation = Conversation::with_system("You write short programs.");
        conversation.push_user(
            "Write a one-line POSIX shell script that writes hello to out.txt. \
             Return it in a single fenced code block.",
            Some("request_code"),
        );

        let text = brain.generate(&conversation).await.unwrap();
        assert!(sandloop::extract::contains_code_block(&text));
    }

    /// A follow-up turn is answered in the context of the earlier ones
    #[tokio::test]
    async fn test_generate_closed_choice() {
        let Some(brain) = get_brain().await else {
            eprintln!("inference endpoint not configured, skipping");
            return;
        };

        let mut conversation = Conversation::new();
        conversation.push_user("Reply with the single letter a.", None);

        let text = brain.generate(&conversation).await.unwrap();
        assert!(!text.trim().is_empty());
    }
}
