// Contract module - declared output files and their validation

pub mod error;
pub mod types;
pub mod validate;

pub use error::{ContractError, ContractFault};
pub use types::{Artifact, Artifacts, ContentKind, OutputFileRequirement, ParsedContent, Table};
pub use validate::OutputContract;
