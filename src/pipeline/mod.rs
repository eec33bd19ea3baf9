// Record pipeline: merge, skin code resolution, normalization, and the worker orchestration around them

pub mod orchestrator;
pub mod processing;

// Re-export key types
pub use orchestrator::{non_blank, Pipeline, PipelineReport, RecordFailure, StopHandle};
