// Extract module - pulls the single fenced code unit out of a generator response

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fence delimiter used by every response
pub const FENCE: &str = "```";

/// Why a response could not be reduced to exactly one code unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFault {
    #[error("no code block found in the response")]
    NoBlockFound,

    #[error("expected exactly one code block, found {count}")]
    MultipleBlocksFound { count: usize },

    #[error("the response has an unterminated code block")]
    IncompleteBlock,
}

/// The extracted source text plus the response it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Inner text of the fenced region, language tag removed
    pub source: String,
    /// Info string of the opening fence, if any
    pub language: Option<String>,
    /// Full response, kept for traceability
    pub response: String,
}

impl CodeUnit {
    /// Source as written to disk for execution
    ///
    /// The fenced text usually starts with the newline that ends the fence line;
    /// dropping it keeps reported line numbers aligned with what the model wrote.
    pub fn runnable(&self) -> &str {
        self.source.trim_start_matches('\n')
    }

    /// Runnable source line by 1-based line number
    pub fn line(&self, lineno: u32) -> Option<&str> {
        let idx = usize::try_from(lineno).ok()?.checked_sub(1)?;
        self.runnable().lines().nth(idx)
    }
}

/// Split the response at every fence and return the text between fence pairs
fn fenced_regions(response: &str) -> Result<Vec<&str>, ExtractionFault> {
    let parts: Vec<&str> = response.split(FENCE).collect();
    let fences = parts.len() - 1;

    if fences % 2 == 1 {
        return Err(ExtractionFault::IncompleteBlock);
    }

    Ok(parts.iter().skip(1).step_by(2).copied().collect())
}

/// Split an info string off the inner text of a region
///
/// The info string is the rest of the opening fence line when it is a single word.
fn split_language(inner: &str) -> (Option<String>, &str) {
    let Some(newline) = inner.find('\n') else {
        return (None, inner);
    };

    let head = &inner[..newline];
    let is_tag = !head.is_empty()
        && head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.'));

    if is_tag {
        (Some(head.to_ascii_lowercase()), &inner[newline..])
    } else {
        (None, inner)
    }
}

/// Extract exactly one code unit from the response
pub fn extract_code(response: &str) -> Result<CodeUnit, ExtractionFault> {
    let regions = fenced_regions(response)?;

    match regions.as_slice() {
        [] => Err(ExtractionFault::NoBlockFound),
        [inner] => {
            let (language, source) = split_language(inner);
            Ok(CodeUnit {
                source: source.to_string(),
                language,
                response: response.to_string(),
            })
        }
        many => Err(ExtractionFault::MultipleBlocksFound { count: many.len() }),
    }
}

/// Whether the text holds at least one complete fenced region
pub fn contains_code_block(text: &str) -> bool {
    fenced_regions(text).map(|r| !r.is_empty()).unwrap_or(false)
}
