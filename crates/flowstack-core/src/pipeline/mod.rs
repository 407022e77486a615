//! Top-level orchestration of the seven-frame fusion pipeline.

pub mod orchestrator;

pub use orchestrator::FusionPipeline;
