pub mod config;
pub mod error;
mod processor;
mod provision;
mod runner;

pub use error::PipelineError;
pub use processor::{BatchProcessor, CycleStats, PartitionOutcome, SkipCounts};
pub use provision::provision_tables;
pub use runner::run_bridge;
