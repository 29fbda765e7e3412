use serde::Serialize;
use thiserror::Error;

use crate::instrument::IssuerError;
use crate::store::StoreError;

/// Error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Issuer error: {0}")]
    Issuer(#[from] IssuerError),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Event {0} has no funded units remaining")]
    NoFundedUnits(String),
}

/// Summary of one acquisition cycle.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CycleReport {
    /// Eligible events a purchase was attempted for.
    pub processed: usize,
    /// Requests that reached `Completed`.
    pub succeeded: usize,
    /// Requests that reached `Failed`.
    pub failed: usize,
    /// Requests resting in `CardCreated` awaiting a human.
    pub flagged_for_manual: usize,
    /// Events skipped because a request was already in flight.
    pub skipped: usize,
}
