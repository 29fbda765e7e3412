mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::AcquisitionOrchestrator;
pub use types::{CycleReport, OrchestratorError};
