//! Repository selection and pull request metric collection.

pub mod extractor;
pub mod orchestrator;
pub mod selector;
pub mod types;

pub use orchestrator::{Orchestrator, RunOutcome};
pub use types::RepositoryCandidate;
