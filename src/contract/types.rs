// Data types for Contract module

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a declared output file must contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentKind {
    /// UTF-8 text, optionally bounded in length
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_chars: Option<usize>,
    },
    /// A single JSON document
    Json,
    /// Comma-separated table whose header matches `columns`
    Table { columns: Vec<String> },
}

impl ContentKind {
    pub fn text() -> Self {
        ContentKind::Text { max_chars: None }
    }

    /// Short human wording used in prompts
    pub fn describe(&self) -> String {
        match self {
            ContentKind::Text { max_chars: None } => "a text file".to_string(),
            ContentKind::Text {
                max_chars: Some(max),
            } => format!("a text file of at most {max} characters"),
            ContentKind::Json => "a JSON file".to_string(),
            ContentKind::Table { columns } => format!(
                "a comma-separated table with the header row `{}`",
                columns.join(",")
            ),
        }
    }
}

/// A declared (name, content kind) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFileRequirement {
    pub name: String,
    pub kind: ContentKind,
}

impl OutputFileRequirement {
    pub fn new(name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ContentKind::text())
    }
}

/// Parsed rows of a table output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Content of a validated output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParsedContent {
    Text,
    Json(serde_json::Value),
    Table(Table),
}

/// A validated output file: its raw text and its parsed form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub raw: String,
    pub parsed: ParsedContent,
}

impl Artifact {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Validated outputs keyed by file name
pub type Artifacts = BTreeMap<String, Artifact>;
