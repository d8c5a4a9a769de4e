// Child event channel - JSON lines appended by the prelude

use crate::issues::Issue;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// File the child appends events to, inside the control directory
pub const EVENTS_FILE: &str = "events.jsonl";

/// One event reported by the interception layer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChildEvent {
    Forbidden {
        symbol: String,
    },
    Fault {
        type_name: String,
        message: String,
        #[serde(default)]
        line: Option<u32>,
    },
    Issue {
        code: String,
        message: String,
    },
}

/// Events in the order written; unreadable lines are skipped
pub async fn read_events(path: &Path) -> Vec<ChildEvent> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read child events");
            return Vec::new();
        }
    };
    parse_events(&content)
}

pub fn parse_events(content: &str) -> Vec<ChildEvent> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(line = %line, error = %e, "skipping malformed child event");
                None
            }
        })
        .collect()
}

/// First forbidden symbol reported, if any
pub fn first_forbidden(events: &[ChildEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ChildEvent::Forbidden { symbol } => Some(symbol.as_str()),
        _ => None,
    })
}

/// Issues reported by the child
pub fn reported_issues(events: &[ChildEvent]) -> Vec<Issue> {
    events
        .iter()
        .filter_map(|e| match e {
            ChildEvent::Issue { code, message } => Some(Issue::soft(code.clone(), message.clone())),
            _ => None,
        })
        .collect()
}
