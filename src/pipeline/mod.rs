mod orchestrator;
mod stats;
pub mod validation;

pub use orchestrator::{Orchestrator, RunOptions, RunStage};
pub use stats::{RunStats, RunSummary, StageFailure};
pub use validation::ValidationError;
