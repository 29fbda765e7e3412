pub mod browser;
pub mod config;
pub mod fraud;
pub mod funding;
pub mod instrument;
pub mod inventory;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod store;
pub mod strategy;
pub mod testing;
pub mod vendor;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use fraud::{FraudGate, TargetDecision};
pub use funding::FundingVerifier;
pub use instrument::{HttpInstrumentIssuer, InstrumentIssuer};
pub use inventory::InventoryMaterializer;
pub use orchestrator::{AcquisitionOrchestrator, CycleReport, OrchestratorError};
pub use store::{AcquisitionStore, SqliteAcquisitionStore};
pub use strategy::{
    BrowserStrategy, ManualEscalationStrategy, PurchaseStrategy, StructuredApiStrategy,
};
