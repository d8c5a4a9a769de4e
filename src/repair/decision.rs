// Accept/revise decision parsing

use crate::extract::contains_code_block;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Answer to the closed question asked after a successful session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Revise,
}

/// The answer picked neither option unambiguously
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ambiguous decision: {0:?}")]
pub struct AmbiguousDecision(pub String);

/// Longest answer still read as a bare option letter
const MAX_CHOICE_LEN: usize = 5;

/// Parse a generator answer
///
/// A short answer holding only `a` accepts, only `b` revises. An answer carrying
/// code is read as a wish to change the code.
pub fn parse_decision(response: &str) -> Result<Decision, AmbiguousDecision> {
    let answer = response.trim().to_ascii_lowercase();
    let short = answer.chars().count() < MAX_CHOICE_LEN;
    let has_a = answer.contains('a');
    let has_b = answer.contains('b');

    if short && has_a && !has_b {
        Ok(Decision::Accept)
    } else if short && has_b && !has_a {
        Ok(Decision::Revise)
    } else if contains_code_block(response) {
        Ok(Decision::Revise)
    } else {
        Err(AmbiguousDecision(response.to_string()))
    }
}
